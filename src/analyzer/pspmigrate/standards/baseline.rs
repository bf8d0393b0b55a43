//! Baseline profile checks.
//!
//! Baseline prevents known privilege escalations while allowing the default
//! pod configuration.

use super::{Check, FnCheck, all_containers, containers_reason};
use crate::analyzer::pspmigrate::types::Level;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Capabilities a container may add under baseline.
const ALLOWED_CAPABILITIES: &[&str] = &[
    "AUDIT_WRITE",
    "CHOWN",
    "DAC_OVERRIDE",
    "FOWNER",
    "FSETID",
    "KILL",
    "MKNOD",
    "NET_BIND_SERVICE",
    "SETFCAP",
    "SETGID",
    "SETPCAP",
    "SETUID",
    "SYS_CHROOT",
];

const ALLOWED_SELINUX_TYPES: &[&str] = &[
    "container_t",
    "container_init_t",
    "container_kvm_t",
    "container_engine_t",
];

const SAFE_SYSCTLS: &[&str] = &[
    "kernel.shm_rmid_forced",
    "net.ipv4.ip_local_port_range",
    "net.ipv4.ip_unprivileged_port_start",
    "net.ipv4.tcp_syncookies",
    "net.ipv4.ping_group_range",
    "net.ipv4.ip_local_reserved_ports",
    "net.ipv4.tcp_keepalive_time",
    "net.ipv4.tcp_fin_timeout",
    "net.ipv4.tcp_keepalive_intvl",
    "net.ipv4.tcp_keepalive_probes",
];

const APPARMOR_ANNOTATION_PREFIX: &str = "container.apparmor.security.beta.kubernetes.io/";

pub fn checks() -> Vec<Box<dyn Check>> {
    let table: [(&'static str, fn(&ObjectMeta, &PodSpec) -> Option<String>); 11] = [
        ("privileged", privileged),
        ("hostNamespaces", host_namespaces),
        ("hostPathVolumes", host_path_volumes),
        ("hostPorts", host_ports),
        ("capabilities_baseline", capabilities),
        ("procMount", proc_mount),
        ("seccompProfile_baseline", seccomp),
        ("appArmorProfile", app_armor),
        ("seLinuxOptions", se_linux),
        ("sysctls", sysctls),
        ("windowsHostProcess", windows_host_process),
    ];

    table
        .into_iter()
        .map(|(id, run)| {
            Box::new(FnCheck {
                id,
                level: Level::Baseline,
                run,
            }) as Box<dyn Check>
        })
        .collect()
}

fn privileged(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| c.security_context.and_then(|sc| sc.privileged) == Some(true))
        .map(|c| c.name)
        .collect();
    containers_reason("must not set securityContext.privileged=true", &names)
}

fn host_namespaces(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let mut set = Vec::new();
    if spec.host_network == Some(true) {
        set.push("hostNetwork=true");
    }
    if spec.host_pid == Some(true) {
        set.push("hostPID=true");
    }
    if spec.host_ipc == Some(true) {
        set.push("hostIPC=true");
    }
    (!set.is_empty()).then(|| format!("pod must not set {}", set.join(", ")))
}

fn host_path_volumes(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let names: Vec<&str> = spec
        .volumes
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter(|v| v.host_path.is_some())
        .map(|v| v.name.as_str())
        .collect();
    (!names.is_empty()).then(|| format!("hostPath volumes {} are not allowed", names.join(", ")))
}

fn host_ports(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let mut ports = Vec::new();
    let mut names = Vec::new();
    for container in all_containers(spec) {
        let used: Vec<i32> = container
            .ports
            .iter()
            .filter_map(|p| p.host_port)
            .filter(|port| *port != 0)
            .collect();
        if !used.is_empty() {
            names.push(container.name);
            ports.extend(used);
        }
    }
    let ports: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
    containers_reason(&format!("use hostPort {}", ports.join(", ")), &names)
}

fn capabilities(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let mut names = Vec::new();
    let mut forbidden: Vec<String> = Vec::new();
    for container in all_containers(spec) {
        let added = container
            .security_context
            .and_then(|sc| sc.capabilities.as_ref())
            .and_then(|caps| caps.add.as_deref())
            .unwrap_or_default();
        let bad: Vec<&String> = added
            .iter()
            .filter(|cap| !ALLOWED_CAPABILITIES.contains(&cap.as_str()))
            .collect();
        if !bad.is_empty() {
            names.push(container.name);
            for cap in bad {
                if !forbidden.contains(cap) {
                    forbidden.push(cap.clone());
                }
            }
        }
    }
    containers_reason(
        &format!("must not include {} in securityContext.capabilities.add", forbidden.join(", ")),
        &names,
    )
}

fn proc_mount(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| {
            c.security_context
                .and_then(|sc| sc.proc_mount.as_deref())
                .is_some_and(|mount| mount != "Default")
        })
        .map(|c| c.name)
        .collect();
    containers_reason("must not set securityContext.procMount to a non-default value", &names)
}

fn seccomp(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let unconfined = |profile_type: Option<&str>| profile_type == Some("Unconfined");

    let pod_level = unconfined(
        spec.security_context
            .as_ref()
            .and_then(|sc| sc.seccomp_profile.as_ref())
            .map(|p| p.type_.as_str()),
    );
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| {
            unconfined(
                c.security_context
                    .and_then(|sc| sc.seccomp_profile.as_ref())
                    .map(|p| p.type_.as_str()),
            )
        })
        .map(|c| c.name)
        .collect();

    if pod_level {
        return Some("pod must not set securityContext.seccompProfile.type to \"Unconfined\"".to_string());
    }
    containers_reason(
        "must not set securityContext.seccompProfile.type to \"Unconfined\"",
        &names,
    )
}

fn app_armor(metadata: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let mut bad: Vec<String> = metadata
        .annotations
        .iter()
        .flat_map(|a| a.iter())
        .filter(|(key, value)| {
            key.starts_with(APPARMOR_ANNOTATION_PREFIX)
                && value.as_str() != "runtime/default"
                && !value.starts_with("localhost/")
        })
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect();

    let pod_unconfined = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.app_armor_profile.as_ref())
        .is_some_and(|p| p.type_ == "Unconfined");
    if pod_unconfined {
        bad.push("securityContext.appArmorProfile.type=\"Unconfined\"".to_string());
    }
    for container in all_containers(spec) {
        let unconfined = container
            .security_context
            .and_then(|sc| sc.app_armor_profile.as_ref())
            .is_some_and(|p| p.type_ == "Unconfined");
        if unconfined {
            bad.push(format!(
                "container \"{}\" securityContext.appArmorProfile.type=\"Unconfined\"",
                container.name
            ));
        }
    }

    (!bad.is_empty()).then(|| format!("forbidden AppArmor profiles: {}", bad.join(", ")))
}

fn se_linux(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let mut options = Vec::new();
    if let Some(opts) = spec.security_context.as_ref().and_then(|sc| sc.se_linux_options.as_ref()) {
        options.push(("pod", opts));
    }
    let containers = all_containers(spec);
    for container in &containers {
        if let Some(opts) = container.security_context.and_then(|sc| sc.se_linux_options.as_ref()) {
            options.push((container.name, opts));
        }
    }

    let mut bad = Vec::new();
    for (owner, opts) in options {
        if let Some(t) = opts.type_.as_deref()
            && !t.is_empty()
            && !ALLOWED_SELINUX_TYPES.contains(&t)
        {
            bad.push(format!("{owner}: type \"{t}\""));
        }
        if opts.user.as_deref().is_some_and(|u| !u.is_empty()) {
            bad.push(format!("{owner}: user may not be set"));
        }
        if opts.role.as_deref().is_some_and(|r| !r.is_empty()) {
            bad.push(format!("{owner}: role may not be set"));
        }
    }

    (!bad.is_empty()).then(|| format!("forbidden seLinuxOptions: {}", bad.join(", ")))
}

fn sysctls(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let bad: Vec<&str> = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.sysctls.as_deref())
        .unwrap_or_default()
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| !SAFE_SYSCTLS.contains(name))
        .collect();
    (!bad.is_empty()).then(|| format!("forbidden sysctls {}", bad.join(", ")))
}

fn windows_host_process(_: &ObjectMeta, spec: &PodSpec) -> Option<String> {
    let pod_level = spec
        .security_context
        .as_ref()
        .and_then(|sc| sc.windows_options.as_ref())
        .and_then(|w| w.host_process)
        == Some(true);
    let names: Vec<&str> = all_containers(spec)
        .iter()
        .filter(|c| {
            c.security_context
                .and_then(|sc| sc.windows_options.as_ref())
                .and_then(|w| w.host_process)
                == Some(true)
        })
        .map(|c| c.name)
        .collect();

    if pod_level {
        return Some("pod must not set securityContext.windowsOptions.hostProcess=true".to_string());
    }
    containers_reason("must not set securityContext.windowsOptions.hostProcess=true", &names)
}
