mod round_robin;

pub use round_robin::EndpointSet;
