use irke_town_protocol::BuildingType;

/// Footprint and port layout shared by every building of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingTemplate {
    pub kind: BuildingType,
    pub name: &'static str,
    pub description: &'static str,
    pub width: i32,
    pub height: i32,
    pub has_input_port: bool,
    pub has_output_port: bool,
}

const API: BuildingTemplate = BuildingTemplate {
    kind: BuildingType::Api,
    name: "API Server",
    description: "REST or GraphQL service",
    width: 2,
    height: 2,
    has_input_port: true,
    has_output_port: true,
};

const DATABASE: BuildingTemplate = BuildingTemplate {
    kind: BuildingType::Database,
    name: "Database",
    description: "Data store (PostgreSQL, MongoDB, ...)",
    width: 3,
    height: 2,
    has_input_port: true,
    has_output_port: false,
};

const FRONTEND: BuildingTemplate = BuildingTemplate {
    kind: BuildingType::Frontend,
    name: "Frontend",
    description: "React, Vue or Angular application",
    width: 2,
    height: 3,
    has_input_port: false,
    has_output_port: true,
};

pub fn template(kind: BuildingType) -> &'static BuildingTemplate {
    match kind {
        BuildingType::Api => &API,
        BuildingType::Database => &DATABASE,
        BuildingType::Frontend => &FRONTEND,
    }
}
