//! librdkafka 错误分类

use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use tally::errors::FetchError;

/// 鉴权失败、主题不存在、配置错误等不可恢复，其余按暂时性错误重试
pub fn classify(error: KafkaError) -> FetchError {
    let fatal = match &error {
        KafkaError::ClientConfig(..)
        | KafkaError::ClientCreation(_)
        | KafkaError::Subscription(_) => true,
        _ => error.rdkafka_error_code().is_some_and(is_fatal_code),
    };
    if fatal {
        FetchError::Fatal(error.to_string())
    } else {
        FetchError::Transient(error.to_string())
    }
}

fn is_fatal_code(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::UnknownTopic
            | RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::GroupAuthorizationFailed
            | RDKafkaErrorCode::ClusterAuthorizationFailed
            | RDKafkaErrorCode::SaslAuthenticationFailed
            | RDKafkaErrorCode::Authentication
            | RDKafkaErrorCode::InvalidGroupId
            | RDKafkaErrorCode::Fatal
    )
}
