use std::str::FromStr;

use serde::Serialize;

use crate::error::AnalysisError;
use crate::metrics::Feature;

/// How clients were wired to servers in an experiment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One dedicated server per client.
    Directed,
    /// Exactly two servers shared by two contiguous groups of clients.
    Grouped,
}

impl FromStr for Topology {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "directed" => Ok(Topology::Directed),
            "grouped" | "undirected" => Ok(Topology::Grouped),
            other => Err(AnalysisError::UnknownTopology(other.to_string())),
        }
    }
}

/// Raw setup row as returned by a trace source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetupRecord {
    pub topology: String,
    pub num_clients: u32,
    pub repetitions: u32,
}

/// Immutable parameters of one setup, read once before its repetitions run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetupDescriptor {
    pub setup_id: i64,
    pub topology: Topology,
    pub client_count: u32,
    pub repetition_count: u32,
    pub features: Vec<Feature>,
    pub metric_count: usize,
}

impl SetupDescriptor {
    pub fn new(
        setup_id: i64,
        record: &SetupRecord,
        features: Vec<Feature>,
        metric_count: usize,
    ) -> Result<Self, AnalysisError> {
        Ok(Self {
            setup_id,
            topology: record.topology.parse()?,
            client_count: record.num_clients,
            repetition_count: record.repetitions,
            features,
            metric_count,
        })
    }

    pub fn server_count(&self) -> u32 {
        match self.topology {
            Topology::Directed => self.client_count,
            Topology::Grouped => 2,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// 0-based index of the server a 1-based client index really talked to.
    pub fn target_for(&self, client_index: u32) -> usize {
        let zero_based = client_index.saturating_sub(1) as usize;
        match self.topology {
            Topology::Directed => zero_based,
            Topology::Grouped => {
                if zero_based < self.server_count() as usize {
                    0
                } else {
                    1
                }
            }
        }
    }

    /// Store node ids of the candidate servers, in server index order.
    pub fn server_node_ids(&self, offset: i64) -> Vec<i64> {
        (0..self.server_count() as i64).map(|s| offset + s).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(topology: &str, clients: u32) -> SetupDescriptor {
        let record = SetupRecord { topology: topology.to_string(), num_clients: clients, repetitions: 3 };
        SetupDescriptor::new(1, &record, Feature::ALL.to_vec(), 5).unwrap()
    }

    #[test]
    fn directed_targets_follow_client_index() {
        let d = descriptor("directed", 5);
        assert_eq!(d.server_count(), 5);
        assert_eq!(d.target_for(1), 0);
        assert_eq!(d.target_for(3), 2);
        assert_eq!(d.target_for(5), 4);
    }

    #[test]
    fn grouped_targets_split_in_two() {
        let d = descriptor("grouped", 4);
        assert_eq!(d.server_count(), 2);
        assert_eq!(d.target_for(1), 0);
        assert_eq!(d.target_for(2), 0);
        assert_eq!(d.target_for(3), 1);
        assert_eq!(d.target_for(4), 1);
    }

    #[test]
    fn undirected_is_grouped_and_unknown_fails() {
        assert_eq!("undirected".parse::<Topology>().unwrap(), Topology::Grouped);
        assert!(matches!(
            "mesh".parse::<Topology>(),
            Err(AnalysisError::UnknownTopology(s)) if s == "mesh"
        ));
    }

    #[test]
    fn server_ids_start_at_offset() {
        assert_eq!(descriptor("directed", 3).server_node_ids(31), vec![31, 32, 33]);
        assert_eq!(descriptor("grouped", 6).server_node_ids(31), vec![31, 32]);
    }
}
