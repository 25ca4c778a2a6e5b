//! Kernel configuration
//!
//! Compile-time defaults, optionally overridden by `key=value` tokens from
//! the firmware command line (`cmdline.txt`).

use log::debug;

use crate::dispatch::{Assignment, WorkloadKind};
use crate::gpu_mem::MemFlags;
use crate::mailbox::clock;

/// Default UDP port of the network receive loop
pub const DEFAULT_UDP_PORT: u16 = 8888;

/// Default V3D clock (Hz)
pub const DEFAULT_V3D_RATE_HZ: u32 = 250_000_000;

/// Default log level (notice)
pub const DEFAULT_LOG_LEVEL: u8 = 3;

/// Declarative core table: core 0 coordinates and is never listed
pub const DEFAULT_ASSIGNMENTS: [Assignment; 3] = [
    Assignment::new(1, WorkloadKind::GpuDemo),
    Assignment::new(2, WorkloadKind::NetworkReceive),
    Assignment::new(3, WorkloadKind::Idle),
];

/// GPU memory demo parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuDemoConfig {
    /// Allocation size (bytes)
    pub size: u32,
    /// Allocation alignment (bytes)
    pub alignment: u32,
    pub flags: MemFlags,
    /// Unlock and free the buffer once its address is reported
    pub release: bool,
}

impl GpuDemoConfig {
    pub const fn default() -> Self {
        Self {
            size: 0x80_0000,
            alignment: 0x1000,
            flags: MemFlags::COHERENT.union(MemFlags::ZERO),
            release: true,
        }
    }
}

/// Clock request sent ahead of the V3D identity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V3dInitConfig {
    pub clock_id: u32,
    pub rate_hz: u32,
}

impl V3dInitConfig {
    pub const fn default() -> Self {
        Self {
            clock_id: clock::V3D,
            rate_hz: DEFAULT_V3D_RATE_HZ,
        }
    }
}

/// Network receive loop parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetConfig {
    pub port: u16,
    /// Uptime line period (ms)
    pub report_interval_ms: u64,
}

impl NetConfig {
    pub const fn default() -> Self {
        Self {
            port: DEFAULT_UDP_PORT,
            report_interval_ms: 1000,
        }
    }
}

/// Whole-kernel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub gpu_demo: GpuDemoConfig,
    pub v3d: V3dInitConfig,
    pub net: NetConfig,
    pub assignments: &'static [Assignment],
    /// Command-line scale: 0 off .. 5 trace
    pub log_level: u8,
}

impl KernelConfig {
    pub const fn default() -> Self {
        Self {
            gpu_demo: GpuDemoConfig::default(),
            v3d: V3dInitConfig::default(),
            net: NetConfig::default(),
            assignments: &DEFAULT_ASSIGNMENTS,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }

    /// Merge command-line overrides
    pub fn apply(&mut self, opts: &KernelOptions) {
        if let Some(level) = opts.log_level {
            self.log_level = level;
        }
        if let Some(port) = opts.udp_port {
            self.net.port = port;
        }
        if let Some(rate) = opts.v3d_clock_hz {
            self.v3d.rate_hz = rate;
        }
    }
}

/// Overrides found on the firmware command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KernelOptions {
    pub log_level: Option<u8>,
    pub udp_port: Option<u16>,
    pub v3d_clock_hz: Option<u32>,
}

impl KernelOptions {
    /// Parse whitespace-separated `key=value` tokens
    ///
    /// The firmware puts its own tokens on the same line, so unknown keys
    /// are expected. Malformed values are skipped; a later valid token for
    /// the same key wins.
    pub fn parse(cmdline: &str) -> Self {
        let mut opts = Self::default();

        for token in cmdline.split_whitespace() {
            let Some((key, value)) = token.split_once('=') else {
                debug!(target: "kernel", "ignoring flag {:?}", token);
                continue;
            };

            let parsed = match key {
                "loglevel" => value.parse().map(|v| opts.log_level = Some(v)),
                "udpport" => value.parse().map(|v| opts.udp_port = Some(v)),
                "v3dclock" => value.parse().map(|v| opts.v3d_clock_hz = Some(v)),
                _ => {
                    debug!(target: "kernel", "ignoring unknown key {:?}", key);
                    continue;
                }
            };

            if parsed.is_err() {
                debug!(target: "kernel", "ignoring {}={:?}", key, value);
            }
        }

        opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = KernelConfig::default();
        assert_eq!(cfg.gpu_demo.size, 0x80_0000);
        assert_eq!(cfg.gpu_demo.alignment, 0x1000);
        assert_eq!(cfg.gpu_demo.flags.bits(), 0x18);
        assert_eq!(cfg.v3d.clock_id, 5);
        assert_eq!(cfg.net.port, 8888);
        assert_eq!(cfg.log_level, 3);
        assert_eq!(cfg.assignments.len(), 3);
    }

    #[test]
    fn test_parse_known_keys() {
        let opts = KernelOptions::parse("loglevel=4 udpport=9000 v3dclock=300000000");
        assert_eq!(opts.log_level, Some(4));
        assert_eq!(opts.udp_port, Some(9000));
        assert_eq!(opts.v3d_clock_hz, Some(300_000_000));
    }

    #[test]
    fn test_parse_skips_firmware_tokens() {
        let line = "coherent_pool=1M 8250.nr_uarts=1 bcm2708_fb.fbwidth=656 console=ttyS0,115200 udpport=7000";
        let opts = KernelOptions::parse(line);
        assert_eq!(opts.udp_port, Some(7000));
        assert_eq!(opts.log_level, None);
    }

    #[test]
    fn test_parse_ignores_malformed_values() {
        let opts = KernelOptions::parse("loglevel=loud udpport=70000 v3dclock= loglevel");
        assert_eq!(opts, KernelOptions::default());
    }

    #[test]
    fn test_skipped_tokens_are_logged() {
        let log = crate::mock::CapturedLog::install();
        let opts = KernelOptions::parse("quiet rootwait=yes loglevel=loud");
        assert_eq!(opts, KernelOptions::default());

        assert!(log.contains(r#"kernel: ignoring flag "quiet""#));
        assert!(log.contains(r#"kernel: ignoring unknown key "rootwait""#));
        assert!(log.contains(r#"kernel: ignoring loglevel="loud""#));
    }

    #[test]
    fn test_later_token_wins() {
        let opts = KernelOptions::parse("udpport=1 udpport=bad udpport=2");
        assert_eq!(opts.udp_port, Some(2));
    }

    #[test]
    fn test_apply_merges_overrides() {
        let mut cfg = KernelConfig::default();
        cfg.apply(&KernelOptions::parse("loglevel=5 udpport=9000"));
        assert_eq!(cfg.log_level, 5);
        assert_eq!(cfg.net.port, 9000);
        assert_eq!(cfg.v3d.rate_hz, DEFAULT_V3D_RATE_HZ);
    }

    #[test]
    fn test_empty_cmdline() {
        assert_eq!(KernelOptions::parse(""), KernelOptions::default());
    }
}
