//! Links between simulated verifiers.
//!
//! Every ordered pair of verifiers shares a link. A link can be cut, and an
//! intact link loses each message with the configured probability and
//! otherwise delays it by the base latency plus jitter. All randomness comes
//! from the caller's seeded RNG.

use crate::NodeIndex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::ops::Range;
use std::time::Duration;

/// Floor for a sampled one-way delay.
const MIN_LATENCY: Duration = Duration::from_millis(1);

/// Shape of the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of verifiers. Every verifier is a cycle member.
    pub num_verifiers: u32,
    /// Base one-way latency of every link.
    pub latency: Duration,
    /// Jitter as a fraction of `latency`, applied in both directions.
    pub jitter_fraction: f64,
    /// Probability that an intact link loses a message.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_verifiers: 5,
            latency: Duration::from_millis(100),
            jitter_fraction: 0.2,
            packet_loss_rate: 0.0,
        }
    }
}

/// Fate of one message on one link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    /// Arrives after this delay.
    After(Duration),
    /// The link is cut.
    Cut,
    /// Lost in transit.
    Lost,
}

/// The links between all verifiers, with the set of cut links.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Directed links that carry nothing: `(from, to)`.
    cut: BTreeSet<(NodeIndex, NodeIndex)>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            cut: BTreeSet::new(),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn verifiers(&self) -> Range<NodeIndex> {
        0..self.config.num_verifiers
    }

    /// Decide what happens to a message sent from `from` to `to`.
    ///
    /// A cut link draws nothing from `rng`, so cutting links does not shift
    /// the random sequence seen by the rest of the network.
    pub fn route(&self, from: NodeIndex, to: NodeIndex, rng: &mut ChaCha8Rng) -> Delivery {
        if self.is_cut(from, to) {
            return Delivery::Cut;
        }
        let loss = self.config.packet_loss_rate;
        if loss > 0.0 && rng.gen::<f64>() < loss {
            return Delivery::Lost;
        }
        Delivery::After(self.latency(rng))
    }

    /// One-way delay for an intact link.
    pub fn latency(&self, rng: &mut ChaCha8Rng) -> Duration {
        let base = self.config.latency.as_secs_f64();
        let spread = base * self.config.jitter_fraction;
        let offset = if spread > 0.0 {
            rng.gen_range(-spread..spread)
        } else {
            0.0
        };
        Duration::from_secs_f64(base + offset).max(MIN_LATENCY)
    }

    pub fn set_packet_loss_rate(&mut self, rate: f64) {
        self.config.packet_loss_rate = rate.clamp(0.0, 1.0);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cutting and healing links
    // ═══════════════════════════════════════════════════════════════════════

    pub fn is_cut(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.cut.contains(&(from, to))
    }

    /// Stop messages from `from` reaching `to`. The reverse link is untouched.
    pub fn cut_one_way(&mut self, from: NodeIndex, to: NodeIndex) {
        self.cut.insert((from, to));
    }

    /// Cut every link between the two sides, in both directions.
    pub fn split(&mut self, left: &[NodeIndex], right: &[NodeIndex]) {
        for &a in left {
            for &b in right {
                self.cut.insert((a, b));
                self.cut.insert((b, a));
            }
        }
    }

    /// Cut `node` off from every other verifier.
    pub fn isolate(&mut self, node: NodeIndex) {
        let others: Vec<NodeIndex> = self.verifiers().filter(|&other| other != node).collect();
        self.split(&[node], &others);
    }

    /// Restore both directions between `a` and `b`.
    pub fn reconnect(&mut self, a: NodeIndex, b: NodeIndex) {
        self.cut.remove(&(a, b));
        self.cut.remove(&(b, a));
    }

    /// Restore every link.
    pub fn heal(&mut self) {
        self.cut.clear();
    }

    /// Number of directed links currently cut.
    pub fn cut_count(&self) -> usize {
        self.cut.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn network(num_verifiers: u32) -> SimulatedNetwork {
        SimulatedNetwork::new(NetworkConfig {
            num_verifiers,
            ..NetworkConfig::default()
        })
    }

    #[test]
    fn test_latency_within_jitter_and_seeded() {
        let network = network(5);
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..100 {
            let latency = network.latency(&mut a);
            assert_eq!(latency, network.latency(&mut b));
            assert!((Duration::from_millis(80)..=Duration::from_millis(120)).contains(&latency));
        }
    }

    #[test]
    fn test_latency_without_jitter_is_exact() {
        let network = SimulatedNetwork::new(NetworkConfig {
            jitter_fraction: 0.0,
            latency: Duration::ZERO,
            ..NetworkConfig::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(network.latency(&mut rng), MIN_LATENCY);
    }

    #[test]
    fn test_one_way_cut() {
        let mut network = network(3);
        network.cut_one_way(0, 1);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(network.route(0, 1, &mut rng), Delivery::Cut);
        assert!(matches!(network.route(1, 0, &mut rng), Delivery::After(_)));
    }

    #[test]
    fn test_split_and_heal() {
        let mut network = network(4);
        network.split(&[0, 1], &[2, 3]);

        assert!(network.is_cut(0, 2));
        assert!(network.is_cut(3, 1));
        assert!(!network.is_cut(0, 1));
        assert!(!network.is_cut(2, 3));
        assert_eq!(network.cut_count(), 8);

        network.heal();
        assert_eq!(network.cut_count(), 0);
    }

    #[test]
    fn test_isolate_then_reconnect_one_peer() {
        let mut network = network(4);
        network.isolate(0);
        assert_eq!(network.cut_count(), 6);
        assert!(!network.is_cut(1, 2));

        network.reconnect(0, 2);
        assert!(!network.is_cut(2, 0));
        assert!(network.is_cut(0, 1));
    }

    #[test]
    fn test_loss_rate_is_honoured_and_clamped() {
        let mut network = SimulatedNetwork::new(NetworkConfig {
            packet_loss_rate: 0.5,
            ..NetworkConfig::default()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let lost = (0..10_000)
            .filter(|_| network.route(0, 1, &mut rng) == Delivery::Lost)
            .count();
        assert!((4_500..5_500).contains(&lost), "lost {lost} of 10000");

        network.set_packet_loss_rate(1.5);
        assert_eq!(network.config().packet_loss_rate, 1.0);
        network.set_packet_loss_rate(-0.5);
        assert_eq!(network.config().packet_loss_rate, 0.0);
    }

    #[test]
    fn test_cut_link_draws_no_randomness() {
        let mut network = network(3);
        network.cut_one_way(0, 1);
        let mut routed = ChaCha8Rng::seed_from_u64(9);
        let mut untouched = ChaCha8Rng::seed_from_u64(9);

        assert_eq!(network.route(0, 1, &mut routed), Delivery::Cut);
        assert_eq!(network.latency(&mut routed), network.latency(&mut untouched));
    }
}
