use std::collections::HashMap;

/// Feature columns captured at one node in one repetition.
///
/// Stored column-major: `columns[f][r]` is feature `f` of the `r`-th observed
/// event. All columns share the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trace {
    n_rows: usize,
    columns: Vec<Vec<f64>>,
}

impl Trace {
    /// Build from columns, truncating every column to the shortest one.
    pub fn new(mut columns: Vec<Vec<f64>>) -> Self {
        let n_rows = columns.iter().map(|c| c.len()).min().unwrap_or(0);
        for col in columns.iter_mut() {
            col.truncate(n_rows);
        }
        Self { n_rows, columns }
    }

    /// Build from event rows, each an ordered tuple of `n_features` values.
    pub fn from_rows<I>(rows: I, n_features: usize) -> Self
    where
        I: IntoIterator<Item = Vec<f64>>,
    {
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); n_features];
        for row in rows {
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(value);
            }
        }
        Self::new(columns)
    }

    pub fn len(&self) -> usize {
        self.n_rows
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Slice of one feature column, `None` if the index is out of range.
    pub fn column(&self, feature: usize) -> Option<&[f64]> {
        self.columns.get(feature).map(|c| c.as_slice())
    }

    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Copy of the first `n` rows (or all of them if shorter).
    pub fn truncated(&self, n: usize) -> Self {
        let n = n.min(self.n_rows);
        Self {
            n_rows: n,
            columns: self.columns.iter().map(|c| c[..n].to_vec()).collect(),
        }
    }
}

/// Truncate both traces to the shorter length; trailing rows of the longer one are dropped.
pub fn align(client: &Trace, server: &Trace) -> (Trace, Trace) {
    let n = client.len().min(server.len());
    (client.truncated(n), server.truncated(n))
}

/// Split rows prefixed with their node id into one trace per node, keeping row order.
pub fn partition_by_node(rows: Vec<(i64, Vec<f64>)>, n_features: usize) -> HashMap<i64, Trace> {
    let mut grouped: HashMap<i64, Vec<Vec<f64>>> = HashMap::new();
    for (node_id, row) in rows {
        grouped.entry(node_id).or_default().push(row);
    }
    grouped
        .into_iter()
        .map(|(node_id, rows)| (node_id, Trace::from_rows(rows, n_features)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_columns() {
        let t = Trace::from_rows(vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]], 2);
        assert_eq!(t.len(), 3);
        assert_eq!(t.n_features(), 2);
        assert_eq!(t.column(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(t.column(1), Some(&[10.0, 20.0, 30.0][..]));
        assert_eq!(t.column(2), None);
    }

    #[test]
    fn empty_rows_give_empty_trace() {
        let t = Trace::from_rows(Vec::new(), 5);
        assert!(t.is_empty());
        assert_eq!(t.n_features(), 5);
    }

    #[test]
    fn align_uses_shorter_length() {
        let client = Trace::new(vec![(0..7).map(f64::from).collect()]);
        let server = Trace::new(vec![(0..5).map(f64::from).collect()]);
        let (c, s) = align(&client, &server);
        assert_eq!(c.len(), 5);
        assert_eq!(s.len(), 5);
        assert_eq!(c.column(0), Some(&[0.0, 1.0, 2.0, 3.0, 4.0][..]));
    }

    #[test]
    fn partition_keeps_order_per_node() {
        let rows = vec![
            (31, vec![1.0]),
            (32, vec![5.0]),
            (31, vec![2.0]),
            (32, vec![6.0]),
            (31, vec![3.0]),
        ];
        let parts = partition_by_node(rows, 1);
        assert_eq!(parts[&31].column(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(parts[&32].column(0), Some(&[5.0, 6.0][..]));
        assert!(!parts.contains_key(&33));
    }
}
