use crate::core::{Result, ShardingError};
use rand::Rng;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

/// Picks one replica of a read/write group. `replicas` is never empty.
pub trait ReplicaLoadBalanceAlgorithm: Send + Sync + Debug {
    fn type_name(&self) -> &'static str;

    fn get_data_source(&self, name: &str, primary: &str, replicas: &[String]) -> String;
}

/// Cycles through the replicas, one counter per group.
#[derive(Debug, Default)]
pub struct RoundRobinLoadBalanceAlgorithm {
    counters: Mutex<HashMap<String, usize>>,
}

impl ReplicaLoadBalanceAlgorithm for RoundRobinLoadBalanceAlgorithm {
    fn type_name(&self) -> &'static str {
        "ROUND_ROBIN"
    }

    fn get_data_source(&self, name: &str, _primary: &str, replicas: &[String]) -> String {
        let position = match self.counters.lock() {
            Ok(mut counters) => {
                let counter = counters.entry(name.to_string()).or_insert(0);
                let position = *counter % replicas.len();
                *counter = counter.wrapping_add(1);
                position
            }
            Err(_) => 0,
        };
        replicas[position].clone()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomLoadBalanceAlgorithm;

impl ReplicaLoadBalanceAlgorithm for RandomLoadBalanceAlgorithm {
    fn type_name(&self) -> &'static str {
        "RANDOM"
    }

    fn get_data_source(&self, _name: &str, _primary: &str, replicas: &[String]) -> String {
        replicas[rand::thread_rng().gen_range(0..replicas.len())].clone()
    }
}

/// Random choice proportional to per-replica weights; unlisted replicas weigh 1.
#[derive(Debug, Clone, Default)]
pub struct WeightLoadBalanceAlgorithm {
    weights: HashMap<String, f64>,
}

impl WeightLoadBalanceAlgorithm {
    pub fn new(props: &HashMap<String, String>) -> Result<Self> {
        let mut weights = HashMap::with_capacity(props.len());
        for (replica, raw) in props {
            let weight: f64 = raw.trim().parse().map_err(|_| {
                ShardingError::InvalidConfig(format!("weight of replica '{replica}' is not a number: {raw}"))
            })?;
            if !weight.is_finite() || weight < 0.0 {
                return Err(ShardingError::InvalidConfig(format!(
                    "weight of replica '{replica}' must be a non-negative number, got {raw}"
                )));
            }
            weights.insert(replica.clone(), weight);
        }
        Ok(Self { weights })
    }

    fn weight(&self, replica: &str) -> f64 {
        self.weights.get(replica).copied().unwrap_or(1.0)
    }

    fn pick(&self, replicas: &[String], point: f64) -> String {
        let mut cumulative = 0.0;
        for replica in replicas {
            cumulative += self.weight(replica);
            if point < cumulative {
                return replica.clone();
            }
        }
        replicas[replicas.len() - 1].clone()
    }
}

impl ReplicaLoadBalanceAlgorithm for WeightLoadBalanceAlgorithm {
    fn type_name(&self) -> &'static str {
        "WEIGHT"
    }

    fn get_data_source(&self, _name: &str, _primary: &str, replicas: &[String]) -> String {
        let total: f64 = replicas.iter().map(|r| self.weight(r)).sum();
        if total <= 0.0 {
            return replicas[0].clone();
        }
        self.pick(replicas, rand::thread_rng().gen_range(0.0..total))
    }
}

/// Builds a load balancer from its type name and props.
pub fn create_load_balancer(
    type_name: &str,
    props: &HashMap<String, String>,
) -> Result<Arc<dyn ReplicaLoadBalanceAlgorithm>> {
    Ok(match type_name.to_uppercase().as_str() {
        "ROUND_ROBIN" => Arc::new(RoundRobinLoadBalanceAlgorithm::default()),
        "RANDOM" => Arc::new(RandomLoadBalanceAlgorithm),
        "WEIGHT" => Arc::new(WeightLoadBalanceAlgorithm::new(props)?),
        other => {
            return Err(ShardingError::InvalidConfig(format!("unknown load balancer type '{other}'")));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replicas() -> Vec<String> {
        vec!["r0".to_string(), "r1".to_string(), "r2".to_string()]
    }

    #[test]
    fn test_round_robin_per_group() {
        let lb = RoundRobinLoadBalanceAlgorithm::default();
        let picks: Vec<_> = (0..4).map(|_| lb.get_data_source("g1", "p", &replicas())).collect();
        assert_eq!(picks, vec!["r0", "r1", "r2", "r0"]);
        assert_eq!(lb.get_data_source("g2", "p", &replicas()), "r0");
    }

    #[test]
    fn test_random_stays_in_set() {
        let lb = create_load_balancer("random", &HashMap::new()).unwrap();
        for _ in 0..20 {
            assert!(replicas().contains(&lb.get_data_source("g", "p", &replicas())));
        }
    }

    #[test]
    fn test_weight_pick() {
        let props = HashMap::from([("r0".to_string(), "0".to_string()), ("r1".to_string(), "3".to_string())]);
        let lb = WeightLoadBalanceAlgorithm::new(&props).unwrap();
        assert_eq!(lb.pick(&replicas(), 0.5), "r1");
        assert_eq!(lb.pick(&replicas(), 3.5), "r2");
        for _ in 0..20 {
            assert_ne!(lb.get_data_source("g", "p", &replicas()), "r0");
        }
        assert!(WeightLoadBalanceAlgorithm::new(&HashMap::from([("r0".to_string(), "-1".to_string())])).is_err());
    }

    #[test]
    fn test_unknown_type() {
        assert!(create_load_balancer("LEAST_CONN", &HashMap::new()).is_err());
    }
}
