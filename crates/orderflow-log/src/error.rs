//! Error types for the log transport.

/// Result type for log operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// Errors that can occur in log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Backend operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Topic does not exist.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Invalid topic name or partition count.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Partition number outside the topic's range.
    #[error("partition {partition} out of range for topic {topic} ({partitions} partitions)")]
    PartitionOutOfRange {
        /// Topic name.
        topic: String,
        /// Requested partition.
        partition: u32,
        /// Partitions the topic has.
        partitions: u32,
    },

    /// Consumer group member description is inconsistent.
    #[error("invalid group assignment: member {member_index} of {member_count}")]
    InvalidAssignment {
        /// Index of this member.
        member_index: u32,
        /// Number of members in the group.
        member_count: u32,
    },
}
