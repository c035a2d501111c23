// self
use crate::{_prelude::*, obs::FlowKind};

/// Resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapper used by lifecycle flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a span tagged with the flow kind and call-site stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oauth2_identity.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `warn` event when tracing is enabled.
#[cfg(feature = "tracing")]
macro_rules! warn_event {
	($($arg:tt)+) => {
		::tracing::warn!($($arg)+)
	};
}
/// Evaluates the event fields by reference when tracing is disabled.
#[cfg(not(feature = "tracing"))]
macro_rules! warn_event {
	($($arg:tt)+) => {
		$crate::obs::event_fields!($($arg)+)
	};
}
pub(crate) use warn_event;

/// Emits a `debug` event when tracing is enabled.
#[cfg(feature = "tracing")]
macro_rules! debug_event {
	($($arg:tt)+) => {
		::tracing::debug!($($arg)+)
	};
}
/// Evaluates the event fields by reference when tracing is disabled.
#[cfg(not(feature = "tracing"))]
macro_rules! debug_event {
	($($arg:tt)+) => {
		$crate::obs::event_fields!($($arg)+)
	};
}
pub(crate) use debug_event;

/// Borrows every `name = value` or `name = %value` field and drops the message.
#[cfg(not(feature = "tracing"))]
macro_rules! event_fields {
	($message:literal $(,)?) => {};
	($name:ident = % $value:expr $(, $($rest:tt)*)?) => {{
		let _ = &$value;

		$($crate::obs::event_fields!($($rest)*);)?
	}};
	($name:ident = $value:expr $(, $($rest:tt)*)?) => {{
		let _ = &$value;

		$($crate::obs::event_fields!($($rest)*);)?
	}};
}
#[cfg(not(feature = "tracing"))]
pub(crate) use event_fields;
