//! Body decorators used by the request logger.
//!
//! `CaptureBody` wraps an outgoing body, forwards every frame to the client
//! untouched and keeps a copy of the data it saw. When the body is finished
//! (or dropped early, e.g. on client disconnect) the completion callback
//! receives what was captured, exactly once.
//!
//! `ReplayBody` hands a partially read request body back to the handler:
//! the bytes already consumed come first, then the unread remainder.

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::http::HeaderMap;
use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;

/// Data collected from a response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// The first `limit` bytes of the body.
    pub bytes: Bytes,
    /// Total number of data bytes forwarded.
    pub total_len: usize,
}

type OnComplete = Box<dyn FnOnce(Captured) + Send>;

pin_project! {
    /// Body decorator copying data frames into an owned buffer.
    pub struct CaptureBody<B> {
        #[pin]
        inner: B,
        buffer: BytesMut,
        limit: usize,
        total_len: usize,
        on_complete: Option<OnComplete>,
    }

    impl<B> PinnedDrop for CaptureBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if let Some(on_complete) = this.on_complete.take() {
                on_complete(Captured {
                    bytes: this.buffer.split().freeze(),
                    total_len: *this.total_len,
                });
            }
        }
    }
}

impl<B> CaptureBody<B> {
    /// Wrap `inner`, retaining at most `limit` bytes of its data.
    pub fn new<F>(inner: B, limit: usize, on_complete: F) -> Self
    where
        F: FnOnce(Captured) + Send + 'static,
    {
        Self {
            inner,
            buffer: BytesMut::new(),
            limit,
            total_len: 0,
            on_complete: Some(Box::new(on_complete)),
        }
    }
}

impl<B> Body for CaptureBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let frame = ready!(this.inner.poll_frame(cx));

        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    *this.total_len += data.len();
                    let room = this.limit.saturating_sub(this.buffer.len());
                    this.buffer.extend_from_slice(&data[..room.min(data.len())]);
                }
            }
            Some(Err(_)) => {}
            None => {
                if let Some(on_complete) = this.on_complete.take() {
                    on_complete(Captured {
                        bytes: this.buffer.split().freeze(),
                        total_len: *this.total_len,
                    });
                }
            }
        }

        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

pin_project! {
    /// Body yielding `prefix`, then the frames of `rest`, then `trailers`.
    pub struct ReplayBody<B> {
        prefix: Option<Bytes>,
        #[pin]
        rest: B,
        trailers: Option<HeaderMap>,
    }
}

impl<B> ReplayBody<B> {
    pub fn new(prefix: Bytes, rest: B, trailers: Option<HeaderMap>) -> Self {
        Self {
            prefix: Some(prefix).filter(|p| !p.is_empty()),
            rest,
            trailers,
        }
    }
}

impl<B> Body for ReplayBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        if let Some(prefix) = this.prefix.take() {
            return Poll::Ready(Some(Ok(Frame::data(prefix))));
        }

        match ready!(this.rest.poll_frame(cx)) {
            Some(frame) => Poll::Ready(Some(frame)),
            None => Poll::Ready(this.trailers.take().map(|t| Ok(Frame::trailers(t)))),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.prefix.is_none() && self.trailers.is_none() && self.rest.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        let extra = self.prefix.as_ref().map_or(0, |p| p.len() as u64);
        let rest = self.rest.size_hint();
        let mut hint = SizeHint::new();
        hint.set_lower(rest.lower() + extra);
        if let Some(upper) = rest.upper() {
            hint.set_upper(upper + extra);
        }
        hint
    }
}
