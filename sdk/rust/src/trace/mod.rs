//! OpenInference span processing and agent trace bridge

mod bridge;
mod clock;
mod processor;
mod view;

pub use bridge::{
    AgentSpan, AgentSpanData, AgentTraceBridge, FunctionSpanData, GenerationSpanData,
    HandoffSpanData, Response, ResponseSpanData, ResponseTool, ResponseUsage, SpanPayload, Trace,
};
pub use clock::{SystemClock, TimestampGenerator, to_system_time};
pub use processor::IntrospectionSpanProcessor;
pub use view::SpanView;
