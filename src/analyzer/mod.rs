//! Analyzers that turn raw probe output into normalized metrics

pub mod ping;
pub mod quality;
pub mod traceroute;

pub use ping::{PingAnalyzer, PingOutputParser, UnixPingParser, WindowsPingParser};
pub use quality::QualityAssessor;
pub use traceroute::{
    TracerouteAnalyzer, TracerouteOutputParser, UnixTracerouteParser, WindowsTracerouteParser,
};
