//! Async Producer Module
//!
//! The caller-supplied function that computes the value for a key.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

/// Boxed future returned by a producer.
pub type ProducerFuture<T, E> = BoxFuture<'static, Result<T, E>>;

/// Computes the value for a key, eventually.
///
/// Implemented for every `Fn(K) -> impl Future<Output = Result<T, E>>`
/// closure, so most callers never name this trait.
pub trait AsyncProducer<K, T, E>: Send + Sync + 'static {
    /// Starts producing the value for `key`.
    fn produce(&self, key: K) -> ProducerFuture<T, E>;
}

impl<K, T, E, F, Fut> AsyncProducer<K, T, E> for F
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    fn produce(&self, key: K) -> ProducerFuture<T, E> {
        self(key).boxed()
    }
}

pub(crate) type SharedProducer<K, T, E> = Arc<dyn AsyncProducer<K, T, E>>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl AsyncProducer<u32, u32, String> for Doubler {
        fn produce(&self, key: u32) -> ProducerFuture<u32, String> {
            async move { Ok(key * 2) }.boxed()
        }
    }

    #[tokio::test]
    async fn test_closure_is_a_producer() {
        let producer = |key: String| async move { Ok::<_, String>(key.len()) };
        let value = producer.produce("four".to_string()).await;
        assert_eq!(value, Ok(4));
    }

    #[tokio::test]
    async fn test_custom_producer() {
        let producer: SharedProducer<u32, u32, String> = Arc::new(Doubler);
        assert_eq!(producer.produce(21).await, Ok(42));
    }
}
