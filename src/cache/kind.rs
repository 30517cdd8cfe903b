//! Watched resource kinds.
//!
//! The set of kinds is fixed at startup. Each kind knows where its collection
//! lives on the backing store so a source can list and watch it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A watched collection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Role,
    RoleBinding,
    ClusterRole,
    ClusterRoleBinding,
    StorageClass,
    Namespace,
    Node,
    ResourceQuota,
    Pod,
    Service,
    PersistentVolumeClaim,
    Secret,
    ConfigMap,
    ControllerRevision,
    StatefulSet,
    Deployment,
    DaemonSet,
    Job,
    CronJob,
}

/// API coordinates of a kind's collection.
struct Coordinates {
    group: &'static str,
    version: &'static str,
    plural: &'static str,
    namespaced: bool,
}

impl ResourceKind {
    /// Every kind the server mirrors before it starts answering requests.
    pub const ALL: [ResourceKind; 19] = [
        ResourceKind::Role,
        ResourceKind::RoleBinding,
        ResourceKind::ClusterRole,
        ResourceKind::ClusterRoleBinding,
        ResourceKind::StorageClass,
        ResourceKind::Namespace,
        ResourceKind::Node,
        ResourceKind::ResourceQuota,
        ResourceKind::Pod,
        ResourceKind::Service,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Secret,
        ResourceKind::ConfigMap,
        ResourceKind::ControllerRevision,
        ResourceKind::StatefulSet,
        ResourceKind::Deployment,
        ResourceKind::DaemonSet,
        ResourceKind::Job,
        ResourceKind::CronJob,
    ];

    fn coordinates(self) -> Coordinates {
        let (group, version, plural, namespaced) = match self {
            ResourceKind::Role => ("rbac.authorization.k8s.io", "v1", "roles", true),
            ResourceKind::RoleBinding => ("rbac.authorization.k8s.io", "v1", "rolebindings", true),
            ResourceKind::ClusterRole => ("rbac.authorization.k8s.io", "v1", "clusterroles", false),
            ResourceKind::ClusterRoleBinding => {
                ("rbac.authorization.k8s.io", "v1", "clusterrolebindings", false)
            }
            ResourceKind::StorageClass => ("storage.k8s.io", "v1", "storageclasses", false),
            ResourceKind::Namespace => ("", "v1", "namespaces", false),
            ResourceKind::Node => ("", "v1", "nodes", false),
            ResourceKind::ResourceQuota => ("", "v1", "resourcequotas", true),
            ResourceKind::Pod => ("", "v1", "pods", true),
            ResourceKind::Service => ("", "v1", "services", true),
            ResourceKind::PersistentVolumeClaim => ("", "v1", "persistentvolumeclaims", true),
            ResourceKind::Secret => ("", "v1", "secrets", true),
            ResourceKind::ConfigMap => ("", "v1", "configmaps", true),
            ResourceKind::ControllerRevision => ("apps", "v1", "controllerrevisions", true),
            ResourceKind::StatefulSet => ("apps", "v1", "statefulsets", true),
            ResourceKind::Deployment => ("apps", "v1", "deployments", true),
            ResourceKind::DaemonSet => ("apps", "v1", "daemonsets", true),
            ResourceKind::Job => ("batch", "v1", "jobs", true),
            ResourceKind::CronJob => ("batch", "v1beta1", "cronjobs", true),
        };
        Coordinates {
            group,
            version,
            plural,
            namespaced,
        }
    }

    /// Kind name, e.g. `"Deployment"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::ClusterRole => "ClusterRole",
            ResourceKind::ClusterRoleBinding => "ClusterRoleBinding",
            ResourceKind::StorageClass => "StorageClass",
            ResourceKind::Namespace => "Namespace",
            ResourceKind::Node => "Node",
            ResourceKind::ResourceQuota => "ResourceQuota",
            ResourceKind::Pod => "Pod",
            ResourceKind::Service => "Service",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::ControllerRevision => "ControllerRevision",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::DaemonSet => "DaemonSet",
            ResourceKind::Job => "Job",
            ResourceKind::CronJob => "CronJob",
        }
    }

    /// Lowercase plural used in collection paths, e.g. `"deployments"`.
    pub fn plural(self) -> &'static str {
        self.coordinates().plural
    }

    /// Whether objects of this kind live inside a namespace.
    pub fn is_namespaced(self) -> bool {
        self.coordinates().namespaced
    }

    /// Cluster-wide collection path on the backing store.
    ///
    /// Core kinds live under `/api/{version}`, grouped kinds under
    /// `/apis/{group}/{version}`.
    pub fn collection_path(self) -> String {
        let c = self.coordinates();
        if c.group.is_empty() {
            format!("/api/{}/{}", c.version, c.plural)
        } else {
            format!("/apis/{}/{}/{}", c.group, c.version, c.plural)
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    /// Accepts the kind name or its plural, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s) || kind.plural().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_paths() {
        assert_eq!(ResourceKind::Pod.collection_path(), "/api/v1/pods");
        assert_eq!(ResourceKind::Deployment.collection_path(), "/apis/apps/v1/deployments");
        assert_eq!(ResourceKind::CronJob.collection_path(), "/apis/batch/v1beta1/cronjobs");
        assert_eq!(
            ResourceKind::ClusterRoleBinding.collection_path(),
            "/apis/rbac.authorization.k8s.io/v1/clusterrolebindings"
        );
    }

    #[test]
    fn parse_by_name_or_plural() {
        assert_eq!("deployment".parse::<ResourceKind>().unwrap(), ResourceKind::Deployment);
        assert_eq!("ConfigMaps".parse::<ResourceKind>().unwrap(), ResourceKind::ConfigMap);
        assert_eq!("StorageClass".parse::<ResourceKind>().unwrap(), ResourceKind::StorageClass);
        assert!("widgets".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn namespaced_kinds() {
        assert!(ResourceKind::Secret.is_namespaced());
        assert!(!ResourceKind::Node.is_namespaced());
        assert!(!ResourceKind::ClusterRole.is_namespaced());
    }

    #[test]
    fn names_round_trip_through_display() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), kind);
        }
    }
}
