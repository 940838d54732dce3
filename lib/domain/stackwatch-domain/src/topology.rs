//! Static stack topology: network, security groups, database, backend
//! compute and CDN frontend. Pure descriptors with no behaviour.

use serde::Serialize;

use crate::config::TopologyConfig;
use crate::naming::Namer;
use crate::policy::{PolicyDocument, PolicyStatement, Principal};

pub const CLOUDFRONT_SERVICE_PRINCIPAL: &str = "cloudfront.amazonaws.com";
const ANYWHERE: &str = "0.0.0.0/0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcSpec {
    pub name: String,
    pub cidr_block: String,
    pub enable_dns_hostnames: bool,
    pub enable_dns_support: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubnetSpec {
    pub name: String,
    pub cidr_block: String,
    pub availability_zone: String,
    pub public: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSpec {
    pub vpc: VpcSpec,
    pub internet_gateway: String,
    pub subnets: Vec<SubnetSpec>,
    pub public_route_table: String,
}

impl NetworkSpec {
    pub fn public_subnet(&self) -> Option<&SubnetSpec> {
        self.subnets.iter().find(|subnet| subnet.public)
    }

    pub fn private_subnets(&self) -> impl Iterator<Item = &SubnetSpec> {
        self.subnets.iter().filter(|subnet| !subnet.public)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficSource {
    Cidr(String),
    SecurityGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrafficRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub peer: TrafficSource,
    pub description: Option<String>,
}

impl TrafficRule {
    fn tcp(port: u16, peer: TrafficSource, description: &str) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            peer,
            description: Some(description.to_string()),
        }
    }

    fn all_outbound() -> Self {
        Self {
            protocol: "-1".to_string(),
            from_port: 0,
            to_port: 0,
            peer: TrafficSource::Cidr(ANYWHERE.to_string()),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    pub description: String,
    pub ingress: Vec<TrafficRule>,
    pub egress: Vec<TrafficRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSpec {
    pub name: String,
    pub subnet_group: String,
    pub subnets: Vec<String>,
    pub security_group: String,
    pub engine: String,
    pub engine_version: String,
    pub instance_class: String,
    pub allocated_storage_gb: u32,
    pub db_name: String,
    pub username: String,
    pub password_secret: String,
    pub publicly_accessible: bool,
    pub skip_final_snapshot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeSpec {
    pub name: String,
    pub size_gb: u32,
    pub volume_type: String,
    pub device_name: String,
}

/// Binds the data volume to the backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeAttachmentSpec {
    pub name: String,
    pub volume: String,
    pub instance: String,
    pub device_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendSpec {
    pub name: String,
    pub instance_type: String,
    pub ami_name_filter: String,
    pub ami_owner: String,
    pub subnet: String,
    pub security_group: String,
    pub key_name: Option<String>,
    pub root_volume_gb: u32,
    pub data_volume: VolumeSpec,
    pub volume_attachment: VolumeAttachmentSpec,
    pub elastic_ip: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Bucket,
    Backend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheBehavior {
    pub path_pattern: Option<String>,
    pub origin: Origin,
    pub allowed_methods: Vec<String>,
    pub cached_methods: Vec<String>,
    pub forward_query_string: bool,
    pub forwarded_headers: Vec<String>,
    pub forward_cookies: bool,
    pub min_ttl: u32,
    pub default_ttl: u32,
    pub max_ttl: u32,
    pub compress: bool,
}

const READ_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS"];
const ALL_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "PUT", "POST", "PATCH", "DELETE"];

fn methods(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

impl CacheBehavior {
    fn static_site() -> Self {
        Self {
            path_pattern: None,
            origin: Origin::Bucket,
            allowed_methods: methods(READ_METHODS),
            cached_methods: methods(&["GET", "HEAD"]),
            forward_query_string: false,
            forwarded_headers: Vec::new(),
            forward_cookies: false,
            min_ttl: 0,
            default_ttl: 3600,
            max_ttl: 86400,
            compress: false,
        }
    }

    fn backend_passthrough(path: &str, headers: &[&str], cached: &[&str]) -> Self {
        Self {
            path_pattern: Some(path.to_string()),
            origin: Origin::Backend,
            allowed_methods: methods(ALL_METHODS),
            cached_methods: methods(cached),
            forward_query_string: true,
            forwarded_headers: methods(headers),
            forward_cookies: true,
            min_ttl: 0,
            default_ttl: 0,
            max_ttl: 0,
            compress: true,
        }
    }

    fn backend_static(path: &str) -> Self {
        Self {
            path_pattern: Some(path.to_string()),
            origin: Origin::Backend,
            allowed_methods: methods(READ_METHODS),
            cached_methods: methods(&["GET", "HEAD"]),
            forward_query_string: false,
            forwarded_headers: Vec::new(),
            forward_cookies: false,
            min_ttl: 0,
            default_ttl: 86400,
            max_ttl: 31_536_000,
            compress: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error_code: u16,
    pub response_code: u16,
    pub response_page_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontendSpec {
    pub bucket: String,
    pub origin_access_control: String,
    pub distribution: String,
    pub bucket_policy: String,
    pub default_root_object: String,
    pub default_behavior: CacheBehavior,
    pub ordered_behaviors: Vec<CacheBehavior>,
    pub error_responses: Vec<ErrorResponse>,
}

impl FrontendSpec {
    /// Lets only this distribution read objects from the bucket.
    pub fn bucket_policy_document(&self, bucket_arn: &str, distribution_arn: &str) -> PolicyDocument {
        PolicyDocument::new(vec![
            PolicyStatement::allow(Principal::Service(CLOUDFRONT_SERVICE_PRINCIPAL.to_string()))
                .sid("AllowCloudFrontServicePrincipal")
                .action("s3:GetObject")
                .resource(format!("{bucket_arn}/*"))
                .condition("StringEquals", "AWS:SourceArn", distribution_arn),
        ])
    }
}

/// A value the stack exports once provisioned: an attribute of one of its
/// resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackOutput {
    pub key: String,
    pub resource: String,
    pub attribute: String,
}

impl StackOutput {
    fn new(key: &str, resource: &str, attribute: &str) -> Self {
        Self {
            key: key.to_string(),
            resource: resource.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackTopology {
    pub network: NetworkSpec,
    pub backend_security_group: SecurityGroupSpec,
    pub database_security_group: SecurityGroupSpec,
    pub database: DatabaseSpec,
    pub backend: BackendSpec,
    pub frontend: FrontendSpec,
    pub outputs: Vec<StackOutput>,
}

impl StackTopology {
    pub fn declare(namer: &Namer, config: &TopologyConfig, home_region: &str) -> Self {
        let zone = |suffix: char| format!("{home_region}{suffix}");
        let subnet = |kind: &str, cidr: &str, az: String, public: bool| SubnetSpec {
            name: namer.name(kind),
            cidr_block: cidr.to_string(),
            availability_zone: az,
            public,
        };

        let network = NetworkSpec {
            vpc: VpcSpec {
                name: namer.name("vpc"),
                cidr_block: "10.0.0.0/16".to_string(),
                enable_dns_hostnames: true,
                enable_dns_support: true,
            },
            internet_gateway: namer.name("igw"),
            subnets: vec![
                subnet("public-subnet", "10.0.1.0/24", zone('a'), true),
                subnet("private-subnet", "10.0.2.0/24", zone('a'), false),
                subnet("private-subnet-2", "10.0.3.0/24", zone('b'), false),
            ],
            public_route_table: namer.name("public-rt"),
        };

        let backend_sg = namer.name("backend-sg");
        let backend_security_group = SecurityGroupSpec {
            name: backend_sg.clone(),
            description: "Allow HTTP, HTTPS and SSH access".to_string(),
            ingress: vec![
                TrafficRule::tcp(22, TrafficSource::Cidr(ANYWHERE.into()), "Allow SSH"),
                TrafficRule::tcp(80, TrafficSource::Cidr(ANYWHERE.into()), "Allow HTTP"),
                TrafficRule::tcp(443, TrafficSource::Cidr(ANYWHERE.into()), "Allow HTTPS"),
            ],
            egress: vec![TrafficRule::all_outbound()],
        };
        let database_security_group = SecurityGroupSpec {
            name: namer.name("db-sg"),
            description: "Allow MySQL access from the backend".to_string(),
            ingress: vec![TrafficRule::tcp(
                3306,
                TrafficSource::SecurityGroup(backend_sg.clone()),
                "Allow MySQL from backend",
            )],
            egress: Vec::new(),
        };

        let database = DatabaseSpec {
            name: namer.name("db"),
            subnet_group: namer.name("db-subnet-group"),
            subnets: network.private_subnets().map(|s| s.name.clone()).collect(),
            security_group: database_security_group.name.clone(),
            engine: "mysql".to_string(),
            engine_version: "8.0".to_string(),
            instance_class: config.db_instance_class.clone(),
            allocated_storage_gb: 20,
            db_name: namer.project().as_str().replace('-', "_"),
            username: "admin".to_string(),
            password_secret: config
                .db_password_secret
                .clone()
                .unwrap_or_else(|| format!("{}/{}/db-password", namer.project(), namer.stack())),
            publicly_accessible: false,
            skip_final_snapshot: true,
        };

        let backend_name = namer.name("backend-server");
        let data_volume = VolumeSpec {
            name: namer.name("storage-vol"),
            size_gb: config.storage_volume_gb,
            volume_type: "gp3".to_string(),
            device_name: "/dev/xvdf".to_string(),
        };
        let volume_attachment = VolumeAttachmentSpec {
            name: namer.name("storage-attach"),
            volume: data_volume.name.clone(),
            instance: backend_name.clone(),
            device_name: data_volume.device_name.clone(),
        };
        let backend = BackendSpec {
            name: backend_name,
            instance_type: config.instance_type.clone(),
            ami_name_filter: "al2023-ami-2023.*-x86_64".to_string(),
            ami_owner: "amazon".to_string(),
            subnet: network
                .public_subnet()
                .map(|s| s.name.clone())
                .unwrap_or_default(),
            security_group: backend_sg,
            key_name: config.key_name.clone(),
            root_volume_gb: config.ebs_size_gb,
            data_volume,
            volume_attachment,
            elastic_ip: namer.name("backend-eip"),
        };

        let spa_fallback = |code| ErrorResponse {
            error_code: code,
            response_code: 200,
            response_page_path: "/index.html".to_string(),
        };
        let frontend = FrontendSpec {
            bucket: namer.name("frontend"),
            origin_access_control: namer.name("oac"),
            distribution: namer.name("distribution"),
            bucket_policy: namer.name("bucket-policy"),
            default_root_object: "index.html".to_string(),
            default_behavior: CacheBehavior::static_site(),
            ordered_behaviors: vec![
                CacheBehavior::backend_passthrough("/api/*", &["*"], READ_METHODS),
                CacheBehavior::backend_passthrough(
                    "/user/*",
                    &["Authorization", "Origin", "Accept", "X-Requested-With", "X-CSRF-Token"],
                    &["GET", "HEAD"],
                ),
                CacheBehavior::backend_static("/orders_files/*"),
                CacheBehavior::backend_static("/images/*"),
            ],
            error_responses: vec![spa_fallback(403), spa_fallback(404)],
        };

        let outputs = vec![
            StackOutput::new("backend_public_ip", &backend.elastic_ip, "public_ip"),
            StackOutput::new("backend_public_dns", &backend.elastic_ip, "public_dns"),
            StackOutput::new("database_endpoint", &database.name, "address"),
            StackOutput::new("frontend_bucket_name", &frontend.bucket, "id"),
            StackOutput::new("cloudfront_url", &frontend.distribution, "domain_name"),
            StackOutput::new("cloudfront_distribution_id", &frontend.distribution, "id"),
        ];

        Self {
            network,
            backend_security_group,
            database_security_group,
            database,
            backend,
            frontend,
            outputs,
        }
    }

    pub fn output(&self, key: &str) -> Option<&StackOutput> {
        self.outputs.iter().find(|output| output.key == key)
    }

    pub fn resource_names(&self) -> Vec<String> {
        let mut names = vec![
            self.network.vpc.name.clone(),
            self.network.internet_gateway.clone(),
            self.network.public_route_table.clone(),
        ];
        names.extend(self.network.subnets.iter().map(|s| s.name.clone()));
        names.extend([
            self.backend_security_group.name.clone(),
            self.database_security_group.name.clone(),
            self.database.name.clone(),
            self.database.subnet_group.clone(),
            self.backend.name.clone(),
            self.backend.data_volume.name.clone(),
            self.backend.volume_attachment.name.clone(),
            self.backend.elastic_ip.clone(),
            self.frontend.bucket.clone(),
            self.frontend.origin_access_control.clone(),
            self.frontend.distribution.clone(),
            self.frontend.bucket_policy.clone(),
        ]);
        names
    }
}
