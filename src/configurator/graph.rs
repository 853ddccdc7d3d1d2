//! Prop dependency graph.
//!
//! Edges come from each prop's `depends_on` list. The graph is checked once
//! per configuration call with Kahn's algorithm; a remote schema with a
//! dangling edge, a self edge or a cycle is rejected as malformed.

use crate::error::{GatewayError, Result};
use crate::model::{Component, ConfiguredProps, PropDefinition};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug)]
pub struct PropGraph {
    /// Topological order; ties keep declaration order
    order: Vec<String>,
    position: HashMap<String, usize>,
    depends_on: HashMap<String, Vec<String>>,
}

impl PropGraph {
    pub fn build(props: &[PropDefinition]) -> Result<Self> {
        let index: HashMap<&str, usize> = props
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        if index.len() != props.len() {
            return Err(GatewayError::upstream("component declares a prop name twice"));
        }

        let mut indegree = vec![0usize; props.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); props.len()];
        for (i, prop) in props.iter().enumerate() {
            for dep in unique(&prop.depends_on) {
                if dep == &prop.name {
                    return Err(GatewayError::upstream(format!(
                        "prop '{}' depends on itself",
                        prop.name
                    )));
                }
                let &d = index.get(dep.as_str()).ok_or_else(|| {
                    GatewayError::upstream(format!(
                        "prop '{}' depends on undeclared prop '{}'",
                        prop.name, dep
                    ))
                })?;
                dependents[d].push(i);
                indegree[i] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..props.len()).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(props.len());
        while let Some(i) = ready.pop_first() {
            order.push(props[i].name.clone());
            for &next in &dependents[i] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() != props.len() {
            let stuck: Vec<&str> = props
                .iter()
                .enumerate()
                .filter(|(i, _)| indegree[*i] > 0)
                .map(|(_, p)| p.name.as_str())
                .collect();
            return Err(GatewayError::upstream(format!(
                "prop dependencies form a cycle through {}",
                stuck.join(", ")
            )));
        }

        let position = order
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        let depends_on = props
            .iter()
            .map(|p| (p.name.clone(), unique(&p.depends_on).cloned().collect()))
            .collect();

        Ok(Self {
            order,
            position,
            depends_on,
        })
    }

    /// Every prop, each after all of its dependencies.
    pub fn resolution_order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, prop: &str) -> bool {
        self.position.contains_key(prop)
    }

    /// Direct dependencies of `prop` with no value (absent or `null`) in
    /// `configured`, in resolution order.
    pub fn unmet_dependencies(&self, prop: &str, configured: &ConfiguredProps) -> Vec<String> {
        let mut unmet: Vec<String> = self
            .depends_on
            .get(prop)
            .into_iter()
            .flatten()
            .filter(|dep| configured.get(*dep).map_or(true, |v| v.is_null()))
            .cloned()
            .collect();
        unmet.sort_by_key(|dep| self.position.get(dep).copied().unwrap_or(usize::MAX));
        unmet
    }
}

impl Component {
    /// Order in which this component's props can be resolved.
    pub fn resolution_order(&self) -> Result<Vec<String>> {
        Ok(PropGraph::build(&self.props)?.resolution_order().to_vec())
    }
}

fn unique(names: &[String]) -> impl Iterator<Item = &String> + '_ {
    names
        .iter()
        .enumerate()
        .filter(move |(i, n)| !names[..*i].contains(*n))
        .map(|(_, n)| n)
}
