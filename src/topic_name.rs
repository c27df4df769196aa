//! Composes `{partition, namespace, topic}` into the fully-qualified name
//! that is the canonical registry key everywhere else in the crate.
//! Conversion back is never needed: the fully-qualified form is kept as the
//! key, and user-facing views only ever strip the partition prefix, never
//! reconstruct the parts.

use crate::error::{NetBusError, Result};
use crate::types::FullyQualifiedName;

/// Builds `<partition>@<namespace>/<topic>`.
///
/// Partition and topic must be non-empty and must not themselves contain
/// `@`, since `@` is the partition delimiter and must remain unambiguous
/// when stripping.
pub fn fully_qualify(partition: &str, namespace: &str, topic: &str) -> Result<FullyQualifiedName> {
    if partition.is_empty() {
        return Err(NetBusError::InvalidTopicName(
            "partition must not be empty".to_string(),
        ));
    }
    if topic.is_empty() {
        return Err(NetBusError::InvalidTopicName(
            "topic must not be empty".to_string(),
        ));
    }
    if partition.contains('@') || namespace.contains('@') || topic.contains('@') {
        return Err(NetBusError::InvalidTopicName(
            "'@' is reserved as the partition delimiter".to_string(),
        ));
    }

    let topic = topic.strip_prefix('/').unwrap_or(topic);
    let full = if namespace.is_empty() {
        format!("{partition}@/{topic}")
    } else {
        let namespace = namespace.trim_matches('/');
        format!("{partition}@{namespace}/{topic}")
    };
    Ok(FullyQualifiedName::from_raw(full))
}

/// Partition-stripped view used by every user-facing listing.
pub fn strip_partition(name: &FullyQualifiedName) -> &str {
    name.strip_partition()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_partition_namespace_topic() {
        let fq = fully_qualify("default", "/examples", "/a").unwrap();
        assert_eq!(fq.as_str(), "default@/examples/a");
    }

    #[test]
    fn strips_leading_slash_redundancy() {
        let fq = fully_qualify("p", "", "a").unwrap();
        assert_eq!(fq.as_str(), "p@/a");
    }

    #[test]
    fn rejects_empty_partition() {
        assert!(fully_qualify("", "ns", "a").is_err());
    }

    #[test]
    fn rejects_empty_topic() {
        assert!(fully_qualify("p", "ns", "").is_err());
    }

    #[test]
    fn rejects_embedded_delimiter() {
        assert!(fully_qualify("p@x", "ns", "a").is_err());
    }

    #[test]
    fn strip_partition_removes_up_to_last_at() {
        let fq = fully_qualify("default", "ns", "a").unwrap();
        assert_eq!(strip_partition(&fq), "ns/a");
    }
}
