use netchan_codec::CodecConfig;

/// Default number of decode workers per bound channel.
pub const DEFAULT_WORKERS: usize = 20;

/// Configuration for a bound channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Decode workers started at bind time. Caps concurrently served
    /// connections; further connections wait in the listen backlog.
    pub workers: usize,
    /// Codec limits and per-connection read timeout.
    pub codec: CodecConfig,
    /// Disable Nagle's algorithm on accepted TCP connections.
    pub nodelay: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            codec: CodecConfig::default(),
            nodelay: true,
        }
    }
}

impl ChannelConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// Configuration for a writer session.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Codec limits and write timeout.
    pub codec: CodecConfig,
    /// Disable Nagle's algorithm on the dialed TCP connection.
    pub nodelay: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            codec: CodecConfig::default(),
            nodelay: true,
        }
    }
}

impl WriterConfig {
    pub fn with_codec(mut self, codec: CodecConfig) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}
