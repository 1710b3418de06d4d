use aws_sdk_dynamodb::Client as TableClient;
use aws_sdk_dynamodbstreams::types::ShardIteratorType;
use aws_sdk_dynamodbstreams::Client as StreamsClient;
use cdc_model::{AttributeMap, AttributeValue, EventName, Shard, StreamRecord};

use crate::{FetchResult, IteratorPosition, SourceError, StreamHandle};

/// A [`crate::StreamSource`] backed by DynamoDB Streams.
///
/// `table_client` resolves table names to stream ARNs; `streams_client`
/// does everything past that point. Both clients are safe to share across
/// every Shard Worker of every table (§5).
pub struct DynamoStreamsSource {
    table_client: TableClient,
    streams_client: StreamsClient,
}

impl DynamoStreamsSource {
    pub fn new(table_client: TableClient, streams_client: StreamsClient) -> Self {
        DynamoStreamsSource { table_client, streams_client }
    }
}

#[async_trait::async_trait]
impl crate::StreamSource for DynamoStreamsSource {
    async fn stream_handle(&self, table_name: &str) -> Result<StreamHandle, SourceError> {
        let output = self
            .table_client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(SourceError::transient)?;

        let stream_arn = output
            .table
            .and_then(|t| t.latest_stream_arn)
            .ok_or_else(|| SourceError::StreamNotEnabled(table_name.to_string()))?;

        Ok(StreamHandle(stream_arn))
    }

    async fn list_shards(&self, stream: &StreamHandle) -> Result<Vec<Shard>, SourceError> {
        let mut shards = Vec::new();
        let mut exclusive_start_shard_id = None;

        loop {
            let mut request = self.streams_client.describe_stream().stream_arn(&stream.0);
            if let Some(id) = exclusive_start_shard_id.take() {
                request = request.exclusive_start_shard_id(id);
            }
            let output = request.send().await.map_err(SourceError::transient)?;
            let description = output.stream_description;

            let Some(description) = description else {
                break;
            };
            for shard in description.shards.unwrap_or_default() {
                let Some(shard_id) = shard.shard_id else { continue };
                let is_closed = shard
                    .sequence_number_range
                    .as_ref()
                    .and_then(|r| r.ending_sequence_number.as_ref())
                    .is_some();
                shards.push(Shard {
                    shard_id,
                    parent_shard_id: shard.parent_shard_id,
                    is_closed,
                });
            }

            exclusive_start_shard_id = description.last_evaluated_shard_id;
            if exclusive_start_shard_id.is_none() {
                break;
            }
        }

        Ok(shards)
    }

    async fn get_iterator(
        &self,
        stream: &StreamHandle,
        shard_id: &str,
        position: IteratorPosition,
    ) -> Result<String, SourceError> {
        let mut request = self
            .streams_client
            .get_shard_iterator()
            .stream_arn(&stream.0)
            .shard_id(shard_id);

        request = match &position {
            IteratorPosition::TrimHorizon => {
                request.shard_iterator_type(ShardIteratorType::TrimHorizon)
            }
            IteratorPosition::Latest => request.shard_iterator_type(ShardIteratorType::Latest),
            IteratorPosition::AfterSequenceNumber(seq) => request
                .shard_iterator_type(ShardIteratorType::AfterSequenceNumber)
                .sequence_number(seq),
        };

        let output = request.send().await.map_err(|err| {
            if is_trim_horizon_expired(&err) {
                SourceError::TrimHorizonExpired(shard_id.to_string())
            } else {
                SourceError::transient(err)
            }
        })?;

        output
            .shard_iterator
            .ok_or_else(|| SourceError::TrimHorizonExpired(shard_id.to_string()))
    }

    async fn fetch(&self, _stream: &StreamHandle, iterator: &str) -> Result<FetchResult, SourceError> {
        let output = self
            .streams_client
            .get_records()
            .shard_iterator(iterator)
            .send()
            .await
            .map_err(SourceError::transient)?;

        let records = output
            .records
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_record)
            .collect();

        Ok(FetchResult { records, next_iterator: output.next_shard_iterator })
    }
}

/// DynamoDB's shard-iterator-expired error carries no distinct variant in
/// the SDK's modeled errors; the service returns it as a generic
/// `TrimmedDataAccessException`, matched here on its name.
fn is_trim_horizon_expired<E>(err: &aws_sdk_dynamodbstreams::error::SdkError<E>) -> bool
where
    E: std::error::Error + aws_sdk_dynamodbstreams::error::ProvideErrorMetadata,
{
    use aws_sdk_dynamodbstreams::error::ProvideErrorMetadata;
    err.code() == Some("TrimmedDataAccessException")
}

fn convert_record(
    record: aws_sdk_dynamodbstreams::types::Record,
) -> Option<StreamRecord> {
    let stream_record = record.dynamodb?;
    let event_name = match record.event_name?.as_str() {
        "INSERT" => EventName::Insert,
        "MODIFY" => EventName::Modify,
        "REMOVE" => EventName::Remove,
        _ => return None,
    };

    Some(StreamRecord {
        event_id: record.event_id.unwrap_or_default(),
        event_name,
        sequence_number: stream_record.sequence_number.unwrap_or_default(),
        approximate_creation_time: stream_record
            .approximate_creation_date_time
            .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), 0))
            .unwrap_or_else(chrono::Utc::now),
        keys: convert_attribute_map(stream_record.keys.unwrap_or_default()),
        new_image: stream_record.new_image.map(convert_attribute_map),
        old_image: stream_record.old_image.map(convert_attribute_map),
    })
}

fn convert_attribute_map(
    attrs: std::collections::HashMap<String, aws_sdk_dynamodbstreams::types::AttributeValue>,
) -> AttributeMap {
    attrs.into_iter().map(|(k, v)| (k, convert_attribute_value(v))).collect()
}

fn convert_attribute_value(value: aws_sdk_dynamodbstreams::types::AttributeValue) -> AttributeValue {
    use aws_sdk_dynamodbstreams::types::AttributeValue as Av;

    match value {
        Av::S(s) => AttributeValue::String(s),
        Av::N(n) => AttributeValue::Number(n),
        Av::Bool(b) => AttributeValue::Boolean(b),
        Av::Null(_) => AttributeValue::Null,
        Av::M(m) => AttributeValue::Map(convert_attribute_map(m)),
        Av::L(l) => AttributeValue::List(l.into_iter().map(convert_attribute_value).collect()),
        Av::Ss(ss) => AttributeValue::StringSet(ss),
        Av::Ns(ns) => AttributeValue::NumberSet(ns),
        Av::B(b) => AttributeValue::Binary(b.into_inner()),
        Av::Bs(bs) => AttributeValue::BinarySet(bs.into_iter().map(|b| b.into_inner()).collect()),
        _ => AttributeValue::Null,
    }
}
