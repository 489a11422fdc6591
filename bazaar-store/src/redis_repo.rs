use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Redis client configured");
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `true` while `key` is within `limit`.
    ///
    /// The window is opened by `SET NX EX` on the first request, so later
    /// requests only count and never push the expiry out.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> redis::RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(window_seconds)
            .ignore()
            .incr(key, 1)
            .query_async(&mut conn)
            .await?;

        Ok(within_limit(count, limit))
    }
}

/// `count` is the request's position in the current window, starting at 1.
pub fn within_limit(count: i64, limit: i64) -> bool {
    count <= limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_allows_up_to_limit() {
        assert!(within_limit(1, 100));
        assert!(within_limit(100, 100));
        assert!(!within_limit(101, 100));
    }

    #[test]
    fn test_fresh_window_is_allowed_again() {
        // After expiry the key is recreated at 0 and the first INCR yields 1.
        assert!(within_limit(1, 1));
        assert!(!within_limit(2, 1));
        assert!(!within_limit(1, 0));
    }
}
