//! Probes that touch the network: child processes, resolvers, sockets and transfers

pub mod bandwidth;
pub mod command;
pub mod dns;
pub mod socket;

pub use bandwidth::{calculate_mbps, calculate_speed, BandwidthProbe, PayloadSource};
pub use command::{CommandOutput, CommandProbe, CommandRunner, SystemCommandRunner};
pub use dns::{DnsAnswer, DnsLookup, DnsProbe, TrustDnsLookup};
pub use socket::{connect_once, ConnectOutcome, Connector, SocketProbe, TcpConnector};
