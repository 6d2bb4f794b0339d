// # -----------------------------
// # crates/tools/src/structure.rs
// # -----------------------------
use fsgate_common::{ServiceName, ServiceRegistry};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub service: ServiceName,
    pub name: &'static str,
    pub path: String,
    pub technology: &'static str,
    pub purpose: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub services: Vec<ServiceSummary>,
    pub key_files: Vec<&'static str>,
}

fn describe(name: ServiceName) -> Option<(&'static str, &'static str, &'static str)> {
    Some(match name {
        ServiceName::Api => (
            "API Service",
            "FastAPI/Python",
            "Backend API for the frontend and CRM integration",
        ),
        ServiceName::Crm => (
            "CRM System",
            "Drupal 10 + CiviCRM",
            "Member and donation management",
        ),
        ServiceName::Frontend => (
            "Frontend",
            "React/TypeScript + TailwindCSS",
            "Main website with design system integration",
        ),
        ServiceName::Games => (
            "Gaming Platform",
            "Web Games + Prisma/PostgreSQL",
            "Educational democracy games",
        ),
        ServiceName::Website => ("Website", "WordPress/HTML", "Static website content"),
        ServiceName::Automation => (
            "Automation",
            "n8n Workflows",
            "Automated workflows and integrations",
        ),
        ServiceName::Root => return None,
    })
}

const KEY_FILES: [&str; 6] = [
    "schema.prisma - database schema for the gaming platform",
    "package.json - monorepo workspace configuration",
    "composer.json - PHP dependencies for CRM/API",
    "build-pipeline.sh - multi-service build automation",
    "scripts/plesk-sync.sh - deployment synchronization",
    "figma-design-system/ - design tokens and branding",
];

/// Static overview of the registered services. Paths come from the registry
/// so directory overrides show up; nothing touches the filesystem.
pub fn project_structure(registry: &ServiceRegistry) -> ProjectStructure {
    let services = ServiceName::ALL
        .into_iter()
        .filter_map(|service| {
            let (name, technology, purpose) = describe(service)?;
            Some(ServiceSummary {
                service,
                name,
                path: format!("{}/", registry.relative_dir(service).trim_end_matches('/')),
                technology,
                purpose,
            })
        })
        .collect();
    ProjectStructure {
        services,
        key_files: KEY_FILES.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsgate_common::Config;

    #[test]
    fn lists_every_addressable_service_with_overrides() {
        let mut cfg = Config {
            project_root: "/srv/project".into(),
            ..Config::default()
        };
        cfg.services.insert("frontend".into(), "apps/web/".into());
        let registry = ServiceRegistry::from_config(&cfg).unwrap();

        let s = project_structure(&registry);
        assert_eq!(s.services.len(), 6);
        let frontend = s
            .services
            .iter()
            .find(|d| d.service == ServiceName::Frontend)
            .unwrap();
        assert_eq!(frontend.path, "apps/web/");

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["services"][3]["service"], "games");
        assert_eq!(json["services"][3]["path"], "web/");
        assert!(json["keyFiles"].as_array().unwrap().len() == KEY_FILES.len());
    }
}
