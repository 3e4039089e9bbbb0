// src/exec/reader.rs

//! Line reader for one child stream.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::message::{Message, SharedSink};
use crate::types::Stream;

/// Read `reader` to end-of-stream, emitting one message per line.
///
/// The trailing `\n` (and a preceding `\r`) is stripped; a last line without
/// a newline is still emitted. Invalid UTF-8 is replaced rather than ending
/// the stream. Read errors end the stream quietly: the child's exit status,
/// not the pipe, decides whether the run succeeded.
///
/// Returns the number of lines emitted.
pub async fn read_tagged<R>(reader: R, stream: Stream, sink: SharedSink) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut lines = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                sink.emit(Message::Output {
                    stream,
                    line: decode_line(&buf),
                });
                lines += 1;
            }
            Err(e) => {
                debug!(%stream, error = %e, "read error on child stream; treating as closed");
                break;
            }
        }
    }

    debug!(%stream, lines, "child stream closed");
    lines
}

/// Run [`read_tagged`] on its own Tokio task.
pub fn spawn_reader<R>(reader: R, stream: Stream, sink: SharedSink) -> JoinHandle<usize>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(read_tagged(reader, stream, sink))
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageLog;
    use std::sync::Arc;

    async fn read_all(input: &'static [u8], stream: Stream) -> (usize, Vec<Message>) {
        let log = Arc::new(MessageLog::new());
        let n = read_tagged(input, stream, log.clone()).await;
        (n, log.snapshot())
    }

    #[tokio::test]
    async fn emits_each_line_without_newline() {
        let (n, msgs) = read_all(b"=== RUN TestA\n--- PASS: TestA (0.00s)\r\nPASS\n", Stream::Stdout).await;

        assert_eq!(n, 3);
        assert_eq!(
            msgs,
            vec![
                Message::out("=== RUN TestA"),
                Message::out("--- PASS: TestA (0.00s)"),
                Message::out("PASS"),
            ]
        );
    }

    #[tokio::test]
    async fn final_partial_line_is_emitted() {
        let (_, msgs) = read_all(b"first\nno newline", Stream::Stderr).await;
        assert_eq!(msgs, vec![Message::err("first"), Message::err("no newline")]);
    }

    #[tokio::test]
    async fn empty_lines_are_kept_and_empty_input_emits_nothing() {
        let (_, msgs) = read_all(b"a\n\nb\n", Stream::Stdout).await;
        assert_eq!(msgs, vec![Message::out("a"), Message::out(""), Message::out("b")]);

        let (n, msgs) = read_all(b"", Stream::Stdout).await;
        assert_eq!(n, 0);
        assert!(msgs.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (_, msgs) = read_all(b"ok \xff\n", Stream::Stdout).await;
        assert_eq!(msgs, vec![Message::out("ok \u{fffd}")]);
    }
}
