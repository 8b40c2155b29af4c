use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::*;

/// One request object per line, one reply object per line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Create {
        #[serde(rename = "type")]
        kind: ResourceKind,
        resource_id: String,
        date: String,
        start_time: String,
        end_time: String,
        reserved_by: String,
        #[serde(default)]
        purpose: String,
    },
    Delete {
        id: String,
    },
    ListMonth {
        year: i32,
        month: u32,
    },
    ListDay {
        resource_id: String,
        date: String,
    },
    Resources,
    Slots {
        resource_id: String,
        date: String,
        slot_minutes: Minutes,
    },
}

/// Wire shape of a stored reservation: dates as YYYY-MM-DD, times as HH:MM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub resource_id: String,
    pub resource_name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub reserved_by: String,
    pub purpose: String,
    pub created_at: Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub reserved_by: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Created {
        reservation: ReservationRecord,
    },
    Deleted {
        id: String,
    },
    Reservations {
        reservations: Vec<ReservationRecord>,
    },
    Resources {
        vehicles: Vec<Resource>,
        spaces: Vec<Resource>,
    },
    Slots {
        slots: Vec<String>,
    },
    Error {
        error: ErrorBody,
    },
}

fn record(engine: &Engine, r: &Reservation) -> ReservationRecord {
    let resource_name = engine
        .catalog
        .get(&r.resource_id)
        .map(|res| res.display_name.clone())
        .unwrap_or_default();
    ReservationRecord {
        id: r.id.to_string(),
        kind: r.kind,
        resource_id: r.resource_id.clone(),
        resource_name,
        date: r.date.format("%Y-%m-%d").to_string(),
        start_time: format_time(r.range.start),
        end_time: format_time(r.range.end),
        reserved_by: r.reserved_by.clone(),
        purpose: r.purpose.clone(),
        created_at: r.created_at,
    }
}

fn error_reply(kind: &str, message: impl Into<String>) -> Reply {
    Reply::Error {
        error: ErrorBody {
            kind: kind.to_string(),
            message: message.into(),
            conflict: None,
        },
    }
}

fn engine_error_reply(e: EngineError) -> Reply {
    let kind = match &e {
        EngineError::Parse(_) => "parse",
        EngineError::EndNotAfterStart { .. } => "ordering",
        EngineError::BelowMinimumDuration { .. } => "minimum_duration",
        EngineError::Conflict(_) => "conflict",
        EngineError::UnknownResource(_) => "unknown_resource",
        EngineError::KindMismatch { .. } => "kind_mismatch",
        EngineError::NotFound(_) => "not_found",
        EngineError::InvalidInput(_) => "invalid_input",
        EngineError::LimitExceeded(_) => "limit_exceeded",
        EngineError::WalError(_) => "storage",
    };
    let conflict = match &e {
        EngineError::Conflict(c) => Some(ConflictRecord {
            id: c.id.to_string(),
            start_time: format_time(c.range.start),
            end_time: format_time(c.range.end),
            reserved_by: c.reserved_by.clone(),
        }),
        _ => None,
    };
    Reply::Error {
        error: ErrorBody {
            kind: kind.to_string(),
            message: e.to_string(),
            conflict,
        },
    }
}

/// Map a request variant to a short label for metrics.
pub fn request_label(req: &Request) -> &'static str {
    match req {
        Request::Create { .. } => "create",
        Request::Delete { .. } => "delete",
        Request::ListMonth { .. } => "list_month",
        Request::ListDay { .. } => "list_day",
        Request::Resources => "resources",
        Request::Slots { .. } => "slots",
    }
}

pub async fn dispatch(engine: &Engine, req: Request) -> Reply {
    match dispatch_inner(engine, req).await {
        Ok(reply) => reply,
        Err(e) => engine_error_reply(e),
    }
}

async fn dispatch_inner(engine: &Engine, req: Request) -> Result<Reply, EngineError> {
    match req {
        Request::Create {
            kind,
            resource_id,
            date,
            start_time,
            end_time,
            reserved_by,
            purpose,
        } => {
            let date = parse_date(&date)?;
            let start = parse_time(&start_time)?;
            let end = parse_time(&end_time)?;
            let input = NewReservation {
                kind,
                resource_id,
                date,
                // Ordering is the validator's call, not the parser's
                range: TimeRange { start, end },
                reserved_by,
                purpose,
            };
            let stored = engine.create(input).await?;
            Ok(Reply::Created {
                reservation: record(engine, &stored),
            })
        }
        Request::Delete { id } => {
            let id = Ulid::from_string(&id)
                .map_err(|_| EngineError::InvalidInput("malformed reservation id"))?;
            engine.delete(id).await?;
            Ok(Reply::Deleted { id: id.to_string() })
        }
        Request::ListMonth { year, month } => {
            let reservations = engine.list_by_month(year, month).await?;
            Ok(Reply::Reservations {
                reservations: reservations.iter().map(|r| record(engine, r)).collect(),
            })
        }
        Request::ListDay { resource_id, date } => {
            let date = parse_date(&date)?;
            let reservations = engine.list_by_resource_and_date(&resource_id, date).await?;
            Ok(Reply::Reservations {
                reservations: reservations.iter().map(|r| record(engine, r)).collect(),
            })
        }
        Request::Resources => Ok(Reply::Resources {
            vehicles: engine.catalog.vehicles().cloned().collect(),
            spaces: engine.catalog.spaces().cloned().collect(),
        }),
        Request::Slots {
            resource_id,
            date,
            slot_minutes,
        } => {
            let date = parse_date(&date)?;
            let slots = engine.available_slots(&resource_id, date, slot_minutes).await?;
            Ok(Reply::Slots { slots })
        }
    }
}

/// Serve one client: read a JSON request per line, write a JSON reply per
/// line. A malformed line gets a `bad_request` reply and the connection
/// stays open.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(64 * 1024));

    while let Some(line) = framed.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Request>(&line) {
            Ok(req) => {
                let label = request_label(&req);
                let start = std::time::Instant::now();
                let reply = dispatch(&engine, req).await;
                let status = match &reply {
                    Reply::Error { .. } => "error",
                    _ => "ok",
                };
                metrics::counter!(
                    crate::observability::REQUESTS_TOTAL,
                    "op" => label,
                    "status" => status
                )
                .increment(1);
                metrics::histogram!(
                    crate::observability::REQUEST_DURATION_SECONDS,
                    "op" => label
                )
                .record(start.elapsed().as_secs_f64());
                reply
            }
            Err(e) => error_reply("bad_request", format!("invalid request: {e}")),
        };

        framed.send(serde_json::to_string(&reply)?).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_parses_create() {
        let line = r#"{"op":"create","type":"vehicle","resource_id":"vehicle-1","date":"2025-06-02","start_time":"09:00","end_time":"10:30","reserved_by":"mori","purpose":"haul"}"#;
        let req: Request = serde_json::from_str(line).unwrap();
        assert!(matches!(req, Request::Create { .. }));
        assert_eq!(request_label(&req), "create");
    }

    #[test]
    fn request_purpose_defaults_empty() {
        let line = r#"{"op":"create","type":"space","resource_id":"space-1","date":"2025-06-02","start_time":"09:00","end_time":"10:00","reserved_by":"mori"}"#;
        match serde_json::from_str::<Request>(line).unwrap() {
            Request::Create { purpose, .. } => assert!(purpose.is_empty()),
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn request_rejects_unknown_op() {
        assert!(serde_json::from_str::<Request>(r#"{"op":"update","id":"x"}"#).is_err());
        assert!(serde_json::from_str::<Request>(r#"{"id":"x"}"#).is_err());
    }

    #[test]
    fn conflict_reply_shape() {
        let reply = engine_error_reply(EngineError::Conflict(crate::engine::ConflictDetails {
            id: Ulid::nil(),
            range: TimeRange::new(600, 660),
            reserved_by: "abe".into(),
        }));
        let json = serde_json::to_string(&reply).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reply"], "error");
        assert_eq!(value["error"]["kind"], "conflict");
        assert_eq!(value["error"]["conflict"]["start_time"], "10:00");
        assert_eq!(value["error"]["conflict"]["end_time"], "11:00");
        assert_eq!(value["error"]["conflict"]["reserved_by"], "abe");
    }

    #[test]
    fn plain_error_omits_conflict_field() {
        let reply = engine_error_reply(EngineError::UnknownResource("vehicle-9".into()));
        let json = serde_json::to_string(&reply).unwrap();
        assert!(!json.contains("conflict"));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"]["kind"], "unknown_resource");
    }
}
