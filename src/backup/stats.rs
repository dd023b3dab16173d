use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static SENT_RECEIVED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^sent ([\d.,]+[KMGT]?) bytes\s+received ([\d.,]+[KMGT]?) bytes").expect("valid regex")
});
static TOTAL_SIZE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^total size is ([\d.,]+[KMGT]?)\s+speedup is ([\d.,]+)").expect("valid regex")
});
static XFR: Lazy<Regex> = Lazy::new(|| Regex::new(r"xfr#(\d+)").expect("valid regex"));

/// Figures pulled from rsync's verbose output. Sizes printed with
/// `--human-readable` are scaled back by powers of 1000, so they are approximate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferSummary {
    pub files_transferred: u64,
    pub bytes_sent: Option<u64>,
    pub bytes_received: Option<u64>,
    pub total_size: Option<u64>,
    pub speedup: Option<f64>,
}

impl TransferSummary {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn observe(&mut self, line: &str) {
        let line = line.trim();

        if let Some(caps) = XFR.captures(line) {
            if let Ok(n) = caps[1].parse::<u64>() {
                self.files_transferred = self.files_transferred.max(n);
            }
        }

        if let Some(caps) = SENT_RECEIVED.captures(line) {
            self.bytes_sent = parse_size(&caps[1]);
            self.bytes_received = parse_size(&caps[2]);
        } else if let Some(caps) = TOTAL_SIZE.captures(line) {
            self.total_size = parse_size(&caps[1]);
            self.speedup = caps[2].replace(',', "").parse().ok();
        }
    }
}

fn parse_size(text: &str) -> Option<u64> {
    let cleaned = text.replace(',', "");
    let (number, multiplier) = match cleaned.chars().last()? {
        'K' => (&cleaned[..cleaned.len() - 1], 1e3),
        'M' => (&cleaned[..cleaned.len() - 1], 1e6),
        'G' => (&cleaned[..cleaned.len() - 1], 1e9),
        'T' => (&cleaned[..cleaned.len() - 1], 1e12),
        _ => (cleaned.as_str(), 1.0),
    };
    let value: f64 = number.parse().ok()?;
    Some((value * multiplier).round() as u64)
}
