use bytes::Bytes;

/// Transport-neutral message frame.
///
/// This is the wire surface between the session and its transport: transports
/// convert their native frame representation into/from `Frame`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<String>),
}

/// Borrow the underlying payload from data frames without allocation.
#[inline]
pub fn frame_bytes(frame: &Frame) -> Option<&[u8]> {
    match frame {
        Frame::Text(bytes) => Some(bytes.as_ref()),
        Frame::Binary(bytes) => Some(bytes.as_ref()),
        Frame::Ping(_) | Frame::Pong(_) | Frame::Close(_) => None,
    }
}

/// Convert owned bytes into a `Frame`, preferring text when valid UTF-8.
#[inline]
pub fn into_frame<B>(bytes: B) -> Frame
where
    B: Into<Bytes>,
{
    let payload = bytes.into();
    if std::str::from_utf8(payload.as_ref()).is_ok() {
        Frame::Text(payload)
    } else {
        Frame::Binary(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_frame_prefers_text_for_utf8() {
        assert!(matches!(into_frame(b"{\"name\":\"t\"}".to_vec()), Frame::Text(_)));
        assert!(matches!(into_frame(vec![0xff, 0xfe, 0x00]), Frame::Binary(_)));
    }

    #[test]
    fn frame_bytes_skips_control_frames() {
        assert!(frame_bytes(&Frame::Close(None)).is_none());
        assert!(frame_bytes(&Frame::Ping(Bytes::new())).is_none());
        assert_eq!(
            frame_bytes(&Frame::Text(Bytes::from_static(b"x"))),
            Some(&b"x"[..])
        );
    }
}
