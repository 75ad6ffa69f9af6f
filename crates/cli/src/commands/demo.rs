use std::process;

use stackform_core::{
    exprs, Expr, Mapping, Output, Parameter, Pseudo, Resource, Template, TemplateError,
};

use super::{print_document, report_findings};
use crate::{report_error, OutputFormat};

const LAUNCH_CONFIGURATION: &str = "ContainerLaunchConfiguration";

pub(crate) fn cmd_demo(compact: bool, output: OutputFormat, quiet: bool) {
    let mut template = match ecs_cluster() {
        Ok(t) => t,
        Err(e) => {
            let msg = format!("error building demo template: {}", e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    match template.compile() {
        Ok(doc) => print_document(&doc, compact),
        Err(e) => {
            report_findings(&e, output, quiet);
            process::exit(1);
        }
    }
}

fn assume_role(service: &str) -> Expr {
    Expr::object([(
        "Statement",
        Expr::list([Expr::object([
            ("Effect", Expr::from("Allow")),
            (
                "Principal",
                Expr::object([("Service", Expr::list([service]))]),
            ),
            ("Action", Expr::list(["sts:AssumeRole"])),
        ])]),
    )])
}

fn policy(name: &str, actions: &[&str]) -> Expr {
    Expr::object([
        ("PolicyName", Expr::from(name)),
        (
            "PolicyDocument",
            Expr::object([(
                "Statement",
                Expr::list([Expr::object([
                    ("Effect", Expr::from("Allow")),
                    ("Action", Expr::list(actions.iter().copied())),
                    ("Resource", Expr::from("*")),
                ])]),
            )]),
        ),
    ])
}

fn image_url(repository: &Expr) -> Vec<Expr> {
    exprs![
        Pseudo::AccountId,
        ".dkr.ecr.",
        Pseudo::Region,
        ".amazonaws.com/",
        repository.clone(),
    ]
}

/// Public/private VPC with a NAT instance, an ECR repository and an ECS
/// cluster on an auto scaling group. The web service is only deployed when a
/// revision is given.
pub(crate) fn ecs_cluster() -> Result<Template, TemplateError> {
    let mut t = Template::new();

    // Repository

    let repository = t.add_resource(
        "ApplicationRepository",
        Resource::new("AWS::ECR::Repository")
            .with_property("RepositoryName", "application")
            .with_property(
                "RepositoryPolicyText",
                Expr::object([
                    ("Version", Expr::from("2008-10-17")),
                    (
                        "Statement",
                        Expr::list([Expr::object([
                            ("Sid", Expr::from("AllowPushPull")),
                            ("Effect", Expr::from("Allow")),
                            (
                                "Principal",
                                Expr::object([(
                                    "AWS",
                                    Expr::list([Expr::join(
                                        "",
                                        exprs!["arn:aws:iam::", Pseudo::AccountId, ":root"],
                                    )]),
                                )]),
                            ),
                            (
                                "Action",
                                Expr::list([
                                    "ecr:GetDownloadUrlForLayer",
                                    "ecr:BatchGetImage",
                                    "ecr:BatchCheckLayerAvailability",
                                    "ecr:PutImage",
                                    "ecr:InitiateLayerUpload",
                                    "ecr:UploadLayerPart",
                                    "ecr:CompleteLayerUpload",
                                ]),
                            ),
                        ])]),
                    ),
                ]),
            ),
    )?;

    t.add_output(
        "RepositoryURL",
        Output::new(Expr::join("", image_url(&repository.reference())))
            .with_description("The docker repository URL"),
    )?;

    // Network

    let vpc = t.add_resource(
        "Vpc",
        Resource::new("AWS::EC2::VPC").with_property("CidrBlock", "10.0.0.0/16"),
    )?;
    let gateway = t.add_resource("InternetGateway", Resource::new("AWS::EC2::InternetGateway"))?;
    t.add_resource(
        "GatewayAttachement",
        Resource::new("AWS::EC2::VPCGatewayAttachment")
            .with_property("VpcId", &vpc)
            .with_property("InternetGatewayId", &gateway),
    )?;

    let public_routes = t.add_resource(
        "PublicRouteTable",
        Resource::new("AWS::EC2::RouteTable").with_property("VpcId", &vpc),
    )?;
    t.add_resource(
        "PublicRoute",
        Resource::new("AWS::EC2::Route")
            .with_property("GatewayId", &gateway)
            .with_property("DestinationCidrBlock", "0.0.0.0/0")
            .with_property("RouteTableId", &public_routes),
    )?;

    let public_subnet = t.add_resource(
        "PublicSubnet",
        Resource::new("AWS::EC2::Subnet")
            .with_property("VpcId", &vpc)
            .with_property("CidrBlock", "10.0.1.0/24"),
    )?;
    t.add_resource(
        "PublicSubnetRouteTableAssociation",
        Resource::new("AWS::EC2::SubnetRouteTableAssociation")
            .with_property("RouteTableId", &public_routes)
            .with_property("SubnetId", &public_subnet),
    )?;

    // NAT

    let nat_type = t.add_parameter(
        "NatInstanceType",
        Parameter::string()
            .with_description("NAT InstanceType")
            .with_default("t1.micro"),
    )?;
    let nat_image = t.add_parameter(
        "NatImageId",
        Parameter::string()
            .with_description("NAT ImageId")
            .with_default("ami-030f4133"),
    )?;
    let nat_key = t.add_parameter(
        "NatKeyName",
        Parameter::string()
            .with_description("NAT KeyName")
            .with_default("keysfortesting"),
    )?;

    // Forward reference: the instance is registered below.
    t.add_resource(
        "NatEIP",
        Resource::new("AWS::EC2::EIP")
            .with_property("InstanceId", Expr::reference("Nat"))
            .with_property("Domain", "vpc"),
    )?;
    let nat = t.add_resource(
        "Nat",
        Resource::new("AWS::EC2::Instance")
            .with_property("SourceDestCheck", "false")
            .with_property("KeyName", &nat_key)
            .with_property("SubnetId", &public_subnet)
            .with_property("ImageId", &nat_image)
            .with_property("InstanceType", &nat_type),
    )?;

    let private_routes = t.add_resource(
        "PrivateRouteTable",
        Resource::new("AWS::EC2::RouteTable").with_property("VpcId", &vpc),
    )?;
    t.add_resource(
        "PrivateNatRoute",
        Resource::new("AWS::EC2::Route")
            .with_property("RouteTableId", &private_routes)
            .with_property("DestinationCidrBlock", "0.0.0.0/0")
            .with_property("InstanceId", &nat),
    )?;

    let mut container_subnets = Vec::new();
    for (zone, cidr) in [("A", "10.0.10.0/24"), ("B", "10.0.11.0/24")] {
        let subnet = t.add_resource(
            format!("Container{}Subnet", zone),
            Resource::new("AWS::EC2::Subnet")
                .with_property("VpcId", &vpc)
                .with_property("CidrBlock", cidr)
                .with_property(
                    "AvailabilityZone",
                    Expr::join("", exprs![Pseudo::Region, zone.to_lowercase()]),
                ),
        )?;
        t.add_resource(
            format!("Container{}RouteTableAssociation", zone),
            Resource::new("AWS::EC2::SubnetRouteTableAssociation")
                .with_property("SubnetId", &subnet)
                .with_property("RouteTableId", &private_routes),
        )?;
        container_subnets.push(subnet);
    }

    // Cluster parameters

    let instance_type = t.add_parameter(
        "ContainerInstanceType",
        Parameter::string()
            .with_description("The container instance type")
            .with_default("t2.micro")
            .with_allowed_values(["t2.micro", "t2.small", "t2.medium"]),
    )?;
    let number = |description: &str, default: &str| {
        Parameter::number()
            .with_description(description)
            .with_default(default)
    };
    let worker_cpu = t.add_parameter("WebWorkerCPU", number("Web worker CPU units", "512"))?;
    let worker_memory = t.add_parameter("WebWorkerMemory", number("Web worker memory", "700"))?;
    let worker_count = t.add_parameter(
        "WebWorkerDesiredCount",
        number("Web worker task instance count", "2"),
    )?;
    let max_scale = t.add_parameter("MaxScale", number("Maximum container instances count", "3"))?;
    let desired_scale = t.add_parameter(
        "DesiredScale",
        number("Desired container instances count", "3"),
    )?;
    let revision = t.add_parameter(
        "WebAppRevision",
        Parameter::string()
            .with_description("An optional docker app revision to deploy")
            .with_default(""),
    )?;

    let deploy = t.add_condition("Deploy", Expr::not(Expr::equals(&revision, "")))?;

    t.add_mapping(
        "ECSRegionMap",
        Mapping::new()
            .with_entry("eu-west-1", [("AMI", "ami-4e6ffe3d")])
            .with_entry("us-east-1", [("AMI", "ami-8f7687e2")])
            .with_entry("us-west-2", [("AMI", "ami-84b44de4")]),
    )?;

    // ECS cluster

    let cluster = t.add_resource("Cluster", Resource::new("AWS::ECS::Cluster"))?;

    let instance_role = t.add_resource(
        "ContainerInstanceRole",
        Resource::new("AWS::IAM::Role")
            .with_property("AssumeRolePolicyDocument", assume_role("ec2.amazonaws.com"))
            .with_property("Path", "/")
            .with_property(
                "Policies",
                Expr::list([
                    policy("ECSManagementPolicy", &["ecs:*"]),
                    policy(
                        "ECRManagementPolicy",
                        &[
                            "ecr:GetAuthorizationToken",
                            "ecr:GetDownloadUrlForLayer",
                            "ecr:BatchGetImage",
                            "ecr:BatchCheckLayerAvailability",
                        ],
                    ),
                ]),
            ),
    )?;

    let instance_profile = t.add_resource(
        "ContainerInstanceProfile",
        Resource::new("AWS::IAM::InstanceProfile")
            .with_property("Path", "/")
            .with_property("Roles", vec![&instance_role]),
    )?;

    let launch_configuration = t.add_resource(
        LAUNCH_CONFIGURATION,
        Resource::new("AWS::AutoScaling::LaunchConfiguration")
            .with_metadata(cfn_init_metadata(&cluster.reference()))
            .with_property("InstanceType", &instance_type)
            .with_property(
                "ImageId",
                Expr::map_lookup("ECSRegionMap", Pseudo::Region, "AMI")?,
            )
            .with_property("IamInstanceProfile", &instance_profile)
            .with_property(
                "UserData",
                Expr::encode(Expr::join(
                    "",
                    exprs![
                        "#!/bin/bash -xe\n",
                        "yum install -y aws-cfn-bootstrap\n",
                        "/opt/aws/bin/cfn-init -v ",
                        "         --stack",
                        Pseudo::StackName,
                        format!("         --resource {} ", LAUNCH_CONFIGURATION),
                        "         --region ",
                        Pseudo::Region,
                        "\n",
                    ],
                )),
            ),
    )?;

    let autoscaling_group = t.add_resource(
        "AutoScalingGroup",
        Resource::new("AWS::AutoScaling::AutoScalingGroup")
            .with_property("VPCZoneIdentifier", container_subnets)
            .with_property("MinSize", &desired_scale)
            .with_property("MaxSize", &max_scale)
            .with_property("DesiredCapacity", &desired_scale)
            .with_property("LaunchConfigurationName", &launch_configuration)
            .with_property("HealthCheckType", "EC2")
            .with_property("HealthCheckGracePeriod", 300),
    )?;

    // ECS task and service

    let mut image = image_url(&repository.reference());
    image.push(Expr::from(":"));
    image.push(revision.reference());
    let web_task = t.add_resource(
        "WebTask",
        Resource::new("AWS::ECS::TaskDefinition")
            .with_condition(&deploy)
            .with_property(
                "ContainerDefinitions",
                Expr::list([Expr::object([
                    ("Name", Expr::from("WebWorker")),
                    ("Cpu", Expr::from(&worker_cpu)),
                    ("Memory", Expr::from(&worker_memory)),
                    ("Essential", Expr::from(true)),
                    ("Image", Expr::join("", image)),
                ])]),
            ),
    )?;

    let service_role = t.add_resource(
        "AppServiceRole",
        Resource::new("AWS::IAM::Role")
            .with_property("AssumeRolePolicyDocument", assume_role("ecs.amazonaws.com"))
            .with_property("Path", "/")
            .with_property(
                "Policies",
                Expr::list([policy(
                    "WebServicePolicy",
                    &[
                        "elasticloadbalancing:Describe*",
                        "elasticloadbalancing:DeregisterInstancesFromLoadBalancer",
                        "elasticloadbalancing:RegisterInstancesWithLoadBalancer",
                        "ec2:Describe*",
                        "ec2:AuthorizeSecurityGroupIngress",
                    ],
                )]),
            ),
    )?;

    t.add_resource(
        "AppService",
        Resource::new("AWS::ECS::Service")
            .with_property("Cluster", &cluster)
            .with_condition(&deploy)
            .depends_on(&autoscaling_group)
            .with_property("DesiredCount", &worker_count)
            .with_property("TaskDefinition", &web_task)
            .with_property("Role", &service_role),
    )?;

    Ok(t)
}

/// `AWS::CloudFormation::Init` block: registers the instance with the
/// cluster and keeps cfn-hup watching the launch configuration.
fn cfn_init_metadata(cluster: &Expr) -> Expr {
    let register_cluster = Expr::join(
        "",
        exprs![
            "#!/bin/bash\n",
            "echo ECS_CLUSTER=",
            cluster.clone(),
            " >> /etc/ecs/ecs.config\n",
            "echo 'ECS_AVAILABLE_LOGGING_DRIVERS=",
            "[\"json-file\",\"awslogs\"]'",
            " >> /etc/ecs/ecs.config\n",
        ],
    );
    let hup_conf = Expr::join(
        "",
        exprs![
            "[main]\n",
            "template=",
            Pseudo::StackId,
            "\n",
            "region=",
            Pseudo::Region,
            "\n",
        ],
    );
    let reloader = Expr::join(
        "",
        exprs![
            "[cfn-auto-reloader-hook]\n",
            "triggers=post.update\n",
            format!("path=Resources.{}.", LAUNCH_CONFIGURATION),
            "Metadata.AWS::CloudFormation::Init\n",
            "action=/opt/aws/bin/cfn-init -v ",
            "         --stack",
            Pseudo::StackName,
            format!("         --resource {}", LAUNCH_CONFIGURATION),
            "         --region ",
            Pseudo::Region,
            "\n",
            "runas=root\n",
        ],
    );

    Expr::object([(
        "AWS::CloudFormation::Init",
        Expr::object([(
            "config",
            Expr::object([
                (
                    "commands",
                    Expr::object([(
                        "register_cluster",
                        Expr::object([("command", register_cluster)]),
                    )]),
                ),
                (
                    "files",
                    Expr::object([
                        (
                            "/etc/cfn/cfn-hup.conf",
                            Expr::object([
                                ("content", hup_conf),
                                ("mode", Expr::from("000400")),
                                ("owner", Expr::from("root")),
                                ("group", Expr::from("root")),
                            ]),
                        ),
                        (
                            "/etc/cfn/hooks.d/cfn-auto-reload.conf",
                            Expr::object([("content", reloader)]),
                        ),
                    ]),
                ),
                (
                    "services",
                    Expr::object([(
                        "sysvinit",
                        Expr::object([(
                            "cfn-hup",
                            Expr::object([
                                ("enabled", Expr::from(true)),
                                ("ensureRunning", Expr::from(true)),
                                (
                                    "files",
                                    Expr::list([
                                        "/etc/cfn/cfn-hup.conf",
                                        "/etc/cfn/hooks.d/cfn-auto-reloader.conf",
                                    ]),
                                ),
                            ]),
                        )]),
                    )]),
                ),
            ]),
        )]),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackform_core::CompileError;

    fn compiled() -> Result<serde_json::Value, CompileError> {
        let mut template = ecs_cluster().map_err(|e| CompileError { findings: vec![e] })?;
        template.compile()
    }

    #[test]
    fn demo_template_compiles() {
        let doc = compiled().unwrap();
        assert_eq!(doc["Resources"].as_object().unwrap().len(), 24);
        assert_eq!(doc["Resources"]["AppService"]["DependsOn"], json!(["AutoScalingGroup"]));
        assert_eq!(doc["Resources"]["AppService"]["Condition"], "Deploy");
        assert_eq!(
            doc["Conditions"]["Deploy"],
            json!({"Fn::Not": [{"Fn::Equals": [{"Ref": "WebAppRevision"}, ""]}]})
        );
        assert_eq!(
            doc["Resources"][LAUNCH_CONFIGURATION]["Properties"]["ImageId"],
            json!({"Fn::FindInMap": ["ECSRegionMap", {"Ref": "AWS::Region"}, "AMI"]})
        );
    }

    #[test]
    fn nat_address_references_instance_registered_later() {
        let doc = compiled().unwrap();
        let ids: Vec<&String> = doc["Resources"].as_object().unwrap().keys().collect();
        let eip = ids.iter().position(|id| *id == "NatEIP").unwrap();
        let nat = ids.iter().position(|id| *id == "Nat").unwrap();
        assert!(eip < nat);
        assert_eq!(doc["Resources"]["NatEIP"]["Properties"]["InstanceId"], json!({"Ref": "Nat"}));
    }
}
