use crate::broker::{TopicAdmin, TopicSpec, TopicStatus};
use crate::error::{ProvisionError, TransportError};

/// Creates `spec.name` if it does not exist yet.
///
/// An existing topic is reported as [`TopicStatus::AlreadyExists`] and is not
/// an error; its layout is not compared with `spec`.
#[tracing::instrument(skip(admin), fields(topic = %spec.name))]
pub async fn ensure_topic(
    admin: &dyn TopicAdmin,
    spec: &TopicSpec,
) -> Result<TopicStatus, ProvisionError> {
    match admin.create_topic(spec).await {
        Ok(TopicStatus::Created) => {
            tracing::info!(
                partitions = spec.partitions,
                replication = spec.replication,
                "Topic created"
            );
            Ok(TopicStatus::Created)
        }
        Ok(TopicStatus::AlreadyExists) => {
            tracing::info!("Topic already exists");
            Ok(TopicStatus::AlreadyExists)
        }
        Err(TransportError::Unavailable(reason)) => {
            tracing::error!(%reason, "Broker unavailable while provisioning topic");
            Err(ProvisionError::Connect(TransportError::Unavailable(reason)))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create topic");
            Err(ProvisionError::Create {
                topic: spec.name.clone(),
                reason: e.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBroker;

    #[tokio::test]
    async fn test_ensure_topic_is_idempotent() {
        let broker = InMemoryBroker::new();
        let spec = TopicSpec::new("orders", 3, 1);

        let first = ensure_topic(&broker, &spec).await.unwrap();
        let second = ensure_topic(&broker, &spec).await.unwrap();

        assert_eq!(first, TopicStatus::Created);
        assert_eq!(second, TopicStatus::AlreadyExists);
        assert_eq!(broker.partition_count("orders"), Some(3));
    }

    #[tokio::test]
    async fn test_ensure_topic_rejects_bad_layout() {
        let broker = InMemoryBroker::new();
        let err = ensure_topic(&broker, &TopicSpec::new("orders", 0, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Create { ref topic, .. } if topic == "orders"));
    }
}
