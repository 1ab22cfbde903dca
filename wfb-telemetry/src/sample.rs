use std::time::Instant;

/// Per-packet RSSI reading from a diversity receiver, one value per antenna.
#[derive(Debug, Clone, Copy)]
pub struct RssiSample {
    pub timestamp: Instant,
    pub ant1: u8,
    pub ant2: u8,
}

/// Per-packet SNR reading, one value per antenna.
#[derive(Debug, Clone, Copy)]
pub struct SnrSample {
    pub timestamp: Instant,
    pub ant1: i8,
    pub ant2: i8,
}

/// FEC outcome counters for one batch of packets.
#[derive(Debug, Clone, Copy)]
pub struct FecBatch {
    pub timestamp: Instant,
    pub all: u32,
    pub recovered: u32,
    pub lost: u32,
}

/// Sample kinds that record when they arrived.
pub trait Timestamped {
    fn timestamp(&self) -> Instant;
}

impl Timestamped for RssiSample {
    fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

impl Timestamped for SnrSample {
    fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

impl Timestamped for FecBatch {
    fn timestamp(&self) -> Instant {
        self.timestamp
    }
}

/// Sample kinds that carry one reading per antenna and can be averaged.
pub trait AntennaPair {
    fn ant1(&self) -> f32;
    fn ant2(&self) -> f32;
}

impl AntennaPair for RssiSample {
    fn ant1(&self) -> f32 {
        self.ant1 as f32
    }

    fn ant2(&self) -> f32 {
        self.ant2 as f32
    }
}

impl AntennaPair for SnrSample {
    fn ant1(&self) -> f32 {
        self.ant1 as f32
    }

    fn ant2(&self) -> f32 {
        self.ant2 as f32
    }
}
