use std::collections::BTreeMap;

use amqpmux_frame::{
    channel_name, decode_frame, BasicReturn, CloseReason, Frame, FramePayload, Method, MethodId,
};
use bytes::BytesMut;
use serde::Serialize;
use tracing::{debug, info};

use crate::cmd::InspectArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frames, print_summary, OutputFormat};

/// Sent by clients before the first frame of a connection.
const PROTOCOL_HEADER: &[u8] = b"AMQP\x00\x00\x09\x01";

#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub index: usize,
    pub channel: u16,
    pub channel_name: &'static str,
    pub kind: String,
    pub size: usize,
    pub method: Option<String>,
    pub detail: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ChannelSummary {
    pub channel: u16,
    pub methods: usize,
    pub headers: usize,
    pub bodies: usize,
    pub body_bytes: u64,
    pub heartbeats: usize,
    pub last_method: Option<String>,
}

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let data = std::fs::read(&args.capture)
        .map_err(|err| io_error(&format!("read {}", args.capture.display()), err))?;
    let frames = decode_capture(&data, args.max_frame_size)?;
    info!(frames = frames.len(), path = %args.capture.display(), "capture decoded");

    if args.summary {
        print_summary(frames.len(), &summarize(&frames), format);
    } else {
        print_frames(&records(&frames), format);
    }
    Ok(SUCCESS)
}

pub fn decode_capture(data: &[u8], max_frame_size: usize) -> CliResult<Vec<Frame>> {
    let data = match data.strip_prefix(PROTOCOL_HEADER) {
        Some(rest) => {
            debug!("skipping protocol header");
            rest
        }
        None => data,
    };

    let mut buf = BytesMut::from(data);
    let mut frames = Vec::new();
    while let Some(frame) = decode_frame(&mut buf, max_frame_size)
        .map_err(|err| frame_error(&format!("decode frame #{}", frames.len() + 1), err))?
    {
        frames.push(frame);
    }

    if !buf.is_empty() {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "capture ends with a truncated frame ({} trailing bytes)",
                buf.len()
            ),
        ));
    }
    Ok(frames)
}

pub fn records(frames: &[Frame]) -> Vec<FrameRecord> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| FrameRecord {
            index: i + 1,
            channel: frame.channel,
            channel_name: channel_name(frame.channel),
            kind: frame.kind().to_string(),
            size: frame.wire_size(),
            method: frame.method_id().map(|id| id.to_string()),
            detail: describe(frame),
        })
        .collect()
}

pub fn summarize(frames: &[Frame]) -> Vec<ChannelSummary> {
    let mut channels: BTreeMap<u16, ChannelSummary> = BTreeMap::new();
    for frame in frames {
        let summary = channels.entry(frame.channel).or_insert_with(|| ChannelSummary {
            channel: frame.channel,
            ..ChannelSummary::default()
        });
        match &frame.payload {
            FramePayload::Method(method) => {
                summary.methods += 1;
                summary.last_method = Some(method.id.to_string());
            }
            FramePayload::Header(_) => summary.headers += 1,
            FramePayload::Body(fragment) => {
                summary.bodies += 1;
                summary.body_bytes += fragment.len() as u64;
            }
            FramePayload::Heartbeat => summary.heartbeats += 1,
        }
    }
    channels.into_values().collect()
}

fn describe(frame: &Frame) -> String {
    match &frame.payload {
        FramePayload::Method(method) => describe_method(method),
        FramePayload::Header(header) => format!(
            "class={} body_size={} properties={}B",
            header.class_id,
            header.body_size,
            header.properties.len()
        ),
        FramePayload::Body(fragment) => format!("{} bytes", fragment.len()),
        FramePayload::Heartbeat => String::new(),
    }
}

fn describe_method(method: &Method) -> String {
    if method.is_close() {
        return match CloseReason::decode(&method.args) {
            Ok(reason) => format!("{} {reason}", method.id),
            Err(err) => format!("{} <{err}>", method.id),
        };
    }
    if method.id == MethodId::BASIC_RETURN {
        return match BasicReturn::decode(&method.args) {
            Ok(ret) => format!(
                "{} {} {} exchange='{}' routing_key='{}'",
                method.id, ret.reply_code, ret.reply_text, ret.exchange, ret.routing_key
            ),
            Err(err) => format!("{} <{err}>", method.id),
        };
    }
    if method.args.is_empty() {
        method.id.to_string()
    } else {
        format!("{} ({} arg bytes)", method.id, method.args.len())
    }
}

#[cfg(test)]
mod tests {
    use amqpmux_frame::{encode_frame, DEFAULT_FRAME_MAX};
    use bytes::Bytes;

    use super::*;

    fn capture(frames: &[Frame]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    fn sample() -> Vec<Frame> {
        vec![
            Frame::method(1, Method::channel_open()),
            Frame::method(1, Method::empty(MethodId::BASIC_PUBLISH)),
            Frame::header(1, 60, 5, Bytes::from_static(&[0, 0])),
            Frame::body(1, Bytes::from_static(b"hello")),
            Frame::heartbeat(),
            Frame::method(
                2,
                Method::channel_close(&CloseReason {
                    reply_code: 404,
                    reply_text: "NOT_FOUND".to_string(),
                    class_id: 50,
                    method_id: 10,
                }),
            ),
        ]
    }

    #[test]
    fn decodes_capture_with_protocol_header() {
        let mut data = PROTOCOL_HEADER.to_vec();
        data.extend(capture(&sample()));

        let frames = decode_capture(&data, DEFAULT_FRAME_MAX).unwrap();
        assert_eq!(frames, sample());
    }

    #[test]
    fn truncated_capture_is_data_invalid() {
        let mut data = capture(&sample());
        data.truncate(data.len() - 3);

        let err = decode_capture(&data, DEFAULT_FRAME_MAX).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("truncated"));
    }

    #[test]
    fn corrupt_frame_end_is_data_invalid() {
        let mut data = capture(&[Frame::heartbeat()]);
        let last = data.len() - 1;
        data[last] = 0x00;

        let err = decode_capture(&data, DEFAULT_FRAME_MAX).unwrap_err();
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("decode frame #1"));
    }

    #[test]
    fn summary_counts_per_channel() {
        let summary = summarize(&sample());
        assert_eq!(summary.len(), 3);

        let control = &summary[0];
        assert_eq!((control.channel, control.heartbeats), (0, 1));

        let first = &summary[1];
        assert_eq!(first.channel, 1);
        assert_eq!((first.methods, first.headers, first.bodies), (2, 1, 1));
        assert_eq!(first.body_bytes, 5);
        assert_eq!(first.last_method.as_deref(), Some("basic.publish"));

        assert_eq!(summary[2].last_method.as_deref(), Some("channel.close"));
    }

    #[test]
    fn records_describe_frames() {
        let records = records(&sample());
        assert_eq!(records[0].index, 1);
        assert_eq!(records[0].detail, "channel.open (1 arg bytes)");
        assert_eq!(records[2].kind, "header");
        assert_eq!(records[2].detail, "class=60 body_size=5 properties=2B");
        assert_eq!(records[3].detail, "5 bytes");
        assert_eq!(records[4].channel_name, "CONNECTION");
        assert_eq!(
            records[5].detail,
            "channel.close 404 NOT_FOUND (caused by method(50.10))"
        );
    }
}
