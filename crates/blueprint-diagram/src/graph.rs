use std::collections::HashSet;

use blueprint_core::ArchitecturePlan;
use serde::Serialize;

/// Visual cluster a component is drawn in. Declaration order is emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Frontend,
    ApiGateway,
    Services,
    Databases,
    DataPipeline,
    Other,
}

impl Group {
    pub const ALL: [Group; 6] = [
        Group::Frontend,
        Group::ApiGateway,
        Group::Services,
        Group::Databases,
        Group::DataPipeline,
        Group::Other,
    ];

    /// Case-insensitive match on a component's `type`. Unknown types land in Other.
    pub fn classify(component_type: &str) -> Group {
        match component_type.trim().to_lowercase().as_str() {
            "client" | "web" => Group::Frontend,
            "gateway" => Group::ApiGateway,
            "app" | "service" | "microservice" => Group::Services,
            "database" | "db" => Group::Databases,
            "data_pipeline" | "pipeline" | "etl" => Group::DataPipeline,
            _ => Group::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Frontend => "Frontend",
            Group::ApiGateway => "API Gateway",
            Group::Services => "Services",
            Group::Databases => "Databases",
            Group::DataPipeline => "Reporting / Data Pipeline",
            Group::Other => "Other",
        }
    }

    /// Subgraph name; the `cluster_` prefix makes Graphviz draw a box.
    pub fn cluster_name(self) -> &'static str {
        match self {
            Group::Frontend => "cluster_frontend",
            Group::ApiGateway => "cluster_gateway",
            Group::Services => "cluster_services",
            Group::Databases => "cluster_databases",
            Group::DataPipeline => "cluster_pipeline",
            Group::Other => "cluster_other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    pub group: Group,
    pub label: &'static str,
    pub nodes: Vec<GraphNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

/// A plan laid out as grouped nodes and labelled directed edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct DiagramGraph {
    pub clusters: Vec<Cluster>,
    pub edges: Vec<GraphEdge>,
}

impl DiagramGraph {
    pub fn cluster(&self, group: Group) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.group == group)
    }

    pub fn group_of(&self, id: &str) -> Option<Group> {
        self.clusters
            .iter()
            .find(|c| c.nodes.iter().any(|n| n.id == id))
            .map(|c| c.group)
    }

    pub fn node_count(&self) -> usize {
        self.clusters.iter().map(|c| c.nodes.len()).sum()
    }
}

/// Group components into clusters and keep connections whose endpoints
/// both exist. Deterministic for a given plan.
pub fn synthesize(plan: &ArchitecturePlan) -> DiagramGraph {
    let mut clusters: Vec<Cluster> = Group::ALL
        .iter()
        .map(|&group| Cluster {
            group,
            label: group.label(),
            nodes: Vec::new(),
        })
        .collect();

    let mut known: HashSet<&str> = HashSet::new();
    for component in &plan.components {
        // A repeated id would collapse into one Graphviz node anyway.
        if !known.insert(component.id.as_str()) {
            continue;
        }
        let group = Group::classify(&component.component_type);
        if let Some(cluster) = clusters.iter_mut().find(|c| c.group == group) {
            cluster.nodes.push(GraphNode {
                id: component.id.clone(),
                label: component.label.clone(),
            });
        }
    }
    clusters.retain(|c| !c.nodes.is_empty());

    let edges = plan
        .connections
        .iter()
        .filter(|conn| known.contains(conn.from.as_str()) && known.contains(conn.to.as_str()))
        .map(|conn| GraphEdge {
            from: conn.from.clone(),
            to: conn.to.clone(),
            label: conn.label.clone(),
        })
        .collect();

    DiagramGraph { clusters, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blueprint_core::{Component, Connection};
    use proptest::prelude::*;

    fn plan(components: Vec<Component>, connections: Vec<Connection>) -> ArchitecturePlan {
        ArchitecturePlan {
            components,
            connections,
            ..ArchitecturePlan::default()
        }
    }

    #[test]
    fn frontend_and_other_groups_only() {
        let p = plan(
            vec![
                Component::new("c1", "Client", "client"),
                Component::new("w1", "Web", "web"),
                Component::new("x1", "Weird", "weird"),
            ],
            vec![Connection::new("c1", "w1", "")],
        );
        let g = synthesize(&p);

        let groups: Vec<Group> = g.clusters.iter().map(|c| c.group).collect();
        assert_eq!(groups, [Group::Frontend, Group::Other]);
        assert_eq!(g.cluster(Group::Frontend).unwrap().nodes.len(), 2);
        assert_eq!(g.cluster(Group::Other).unwrap().nodes.len(), 1);
        assert_eq!(
            g.edges,
            vec![GraphEdge {
                from: "c1".into(),
                to: "w1".into(),
                label: String::new()
            }]
        );
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(Group::classify("Client"), Group::Frontend);
        assert_eq!(Group::classify("GATEWAY"), Group::ApiGateway);
        assert_eq!(Group::classify("MicroService"), Group::Services);
        assert_eq!(Group::classify("DB"), Group::Databases);
        assert_eq!(Group::classify("ETL"), Group::DataPipeline);
        assert_eq!(Group::classify("cache"), Group::Other);
        assert_eq!(Group::classify(""), Group::Other);
    }

    #[test]
    fn groups_follow_fixed_order_and_members_keep_plan_order() {
        let p = plan(
            vec![
                Component::new("db1", "Orders DB", "database"),
                Component::new("svc2", "Billing", "service"),
                Component::new("gw", "Gateway", "gateway"),
                Component::new("svc1", "Orders", "app"),
                Component::new("web", "Web", "web"),
                Component::new("etl", "Nightly ETL", "etl"),
            ],
            vec![],
        );
        let g = synthesize(&p);

        let groups: Vec<Group> = g.clusters.iter().map(|c| c.group).collect();
        assert_eq!(
            groups,
            [
                Group::Frontend,
                Group::ApiGateway,
                Group::Services,
                Group::Databases,
                Group::DataPipeline
            ]
        );
        let services: Vec<&str> = g
            .cluster(Group::Services)
            .unwrap()
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(services, ["svc2", "svc1"]);
    }

    #[test]
    fn dangling_connections_are_dropped() {
        let p = plan(
            vec![],
            vec![
                Connection::new("a", "b", "x"),
                Connection::new("c", "d", ""),
            ],
        );
        let g = synthesize(&p);
        assert!(g.edges.is_empty());
        assert!(g.clusters.is_empty());

        let p = plan(
            vec![Component::new("a", "A", "app")],
            vec![Connection::new("a", "ghost", "x")],
        );
        assert!(synthesize(&p).edges.is_empty());
    }

    #[test]
    fn synthesis_is_repeatable() {
        let p = plan(
            vec![
                Component::new("a", "A", "app"),
                Component::new("b", "B", "db"),
            ],
            vec![Connection::new("a", "b", "SQL")],
        );
        assert_eq!(synthesize(&p), synthesize(&p));
        assert_eq!(synthesize(&p).group_of("b"), Some(Group::Databases));
        assert_eq!(synthesize(&p).node_count(), 2);
    }

    fn component_type() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("client".to_string()),
            Just("WEB".to_string()),
            Just("gateway".to_string()),
            Just("microservice".to_string()),
            Just("db".to_string()),
            Just("etl".to_string()),
            "[a-zA-Z_ ]{0,10}",
        ]
    }

    fn arbitrary_plan() -> impl Strategy<Value = ArchitecturePlan> {
        let components = prop::collection::vec(("[a-z]{1,3}", "[ -~]{0,12}", component_type()), 0..16);
        let connections = prop::collection::vec(("[a-z]{1,3}", "[a-z]{1,3}", "[ -~]{0,8}"), 0..16);
        (components, connections).prop_map(|(components, connections)| ArchitecturePlan {
            components: components
                .into_iter()
                .map(|(id, label, kind)| Component::new(&id, &label, &kind))
                .collect(),
            connections: connections
                .into_iter()
                .map(|(from, to, label)| Connection::new(&from, &to, &label))
                .collect(),
            ..ArchitecturePlan::default()
        })
    }

    proptest! {
        #[test]
        fn every_component_lands_in_exactly_one_group(p in arbitrary_plan()) {
            let g = synthesize(&p);
            let unique: HashSet<&str> = p.components.iter().map(|c| c.id.as_str()).collect();
            prop_assert_eq!(g.node_count(), unique.len());

            for id in &unique {
                let hits = g
                    .clusters
                    .iter()
                    .filter(|c| c.nodes.iter().any(|n| n.id == *id))
                    .count();
                prop_assert_eq!(hits, 1);
            }
            prop_assert!(g.clusters.iter().all(|c| !c.nodes.is_empty()));
        }

        #[test]
        fn edges_only_join_known_components(p in arbitrary_plan()) {
            let g = synthesize(&p);
            for edge in &g.edges {
                prop_assert!(g.group_of(&edge.from).is_some());
                prop_assert!(g.group_of(&edge.to).is_some());
            }
            prop_assert_eq!(synthesize(&p), g);
        }
    }
}
