use std::fmt::{self, Display};

use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ChunksError(err) => write!(f, "stream interrupted: {}", err.0),
            Error::InvalidPayload => write!(f, "invalid event stream payload"),
        }
    }
}

/// One dispatched server-sent event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// The `event` field, `None` means the default `message` type.
    pub event: Option<String>,
    /// All `data` lines joined by line feeds.
    pub data: String,
}

/// A type for reading server-sent events from a chunk stream.
pub struct Sse {
    buf: Vec<u8>,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: Vec::new(),
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<Event>, Error> {
        loop {
            // Drain complete events already buffered before reading more,
            // one chunk may carry several of them.
            while let Some(block) = self.take_block() {
                if let Some(event) = parse_block(&block)? {
                    return Ok(Some(event));
                }
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                // A trailing partial event is discarded.
                return Ok(None);
            };
            // Only line feeds are treated as line terminators.
            self.buf.extend(bytes.iter().filter(|b| **b != b'\r'));
        }
    }

    /// Removes the next blank-line-terminated block from the buffer.
    ///
    /// Blocks are split on raw bytes so a multi-byte character split
    /// across chunks is reassembled before decoding.
    fn take_block(&mut self) -> Option<Vec<u8>> {
        let idx = self.buf.windows(2).position(|w| w == b"\n\n")?;
        let mut block: Vec<u8> = self.buf.drain(0..idx + 2).collect();
        block.truncate(idx);
        Some(block)
    }
}

// event         = *( comment / field ) end-of-line
// comment       = colon *any-char end-of-line
// field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
fn parse_block(block: &[u8]) -> Result<Option<Event>, Error> {
    let Ok(block) = str::from_utf8(block) else {
        return Err(Error::InvalidPayload);
    };

    let mut event = None;
    let mut data: Option<String> = None;
    for line in block.split('\n') {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match name {
            "data" => match &mut data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => data = Some(value.to_owned()),
            },
            "event" => event = Some(value.to_owned()),
            // `id` and `retry` only matter for reconnection, which we
            // don't do.
            "id" | "retry" => {}
            _ => return Err(Error::InvalidPayload),
        }
    }

    Ok(data.map(|data| Event { event, data }))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;

    use super::*;

    macro_rules! sse {
        ($($chunk:expr),* $(,)?) => {
            Sse::new(Chunks::from_vec_deque(VecDeque::from([
                $(Bytes::from_static(&$chunk[..])),*
            ])))
        };
    }

    fn data(data: &str) -> Event {
        Event {
            event: None,
            data: data.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_normal_events() {
        let mut sse = sse!(b"data: hello\n\n", b"data: bye\n\n");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("hello"));
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("bye"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_several_events_in_one_chunk() {
        let mut sse = sse!(b"data: one\n\ndata: two\n\n");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("one"));
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("two"));
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quirk_streaming() {
        let mut sse = sse!(b"data:", b" hello\n", b"\n");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("hello"));
        assert_eq!(sse.next_event().await.unwrap(), None);

        // "é" split between two chunks.
        let mut sse = sse!(b"data: caf\xc3", b"\xa9\n\n");
        assert_eq!(sse.next_event().await.unwrap().unwrap(), data("café"));
    }

    #[tokio::test]
    async fn test_fields() {
        let mut sse = sse!(
            b": keep-alive\n\n",
            b"event: message\r\nid: 7\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\n",
        );
        assert_eq!(
            sse.next_event().await.unwrap().unwrap(),
            Event {
                event: Some("message".to_owned()),
                data: "{\"a\":\n1}".to_owned(),
            }
        );
        assert_eq!(sse.next_event().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_invalid_data() {
        let mut sse = sse!(b"xxxxxx\n\n");
        assert_eq!(sse.next_event().await.unwrap_err(), Error::InvalidPayload);

        let mut sse = sse!(b"xxxxxx\n");
        assert_eq!(sse.next_event().await.unwrap(), None);

        let mut sse = sse!(b"data: hello\n", b"data: bye\n");
        assert_eq!(sse.next_event().await.unwrap(), None);
    }
}
