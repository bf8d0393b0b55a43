//! Field-by-field comparison of security-relevant pod fields.
//!
//! Only fields a PodSecurityPolicy can rewrite are compared. Each difference
//! is rendered as `<path>: <template value> != <pod value>`.
//!
//! # Absent vs. explicit values
//!
//! An absent field equals an explicit value only when that value is the
//! field's semantic default and the default is the zero value:
//!
//! | Field                                   | Absent equals      |
//! |-----------------------------------------|--------------------|
//! | `capabilities.add` / `capabilities.drop`| `[]`               |
//! | `supplementalGroups`                    | `[]`               |
//! | `seLinuxOptions.*`                      | `""`               |
//! | `runAsNonRoot`                          | `false`            |
//! | `readOnlyRootFilesystem`                | `false`            |
//! | `allowPrivilegeEscalation`              | nothing (default is `true`) |
//! | `runAsUser` / `runAsGroup` / `fsGroup`  | nothing            |
//!
//! A missing record (the whole security context, `capabilities`,
//! `seLinuxOptions`) is compared as a record whose fields are all absent.

use k8s_openapi::api::core::v1::{
    Capabilities, Pod, PodSecurityContext, PodSpec, PodTemplateSpec, SELinuxOptions,
    SecurityContext,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// Annotation key fragments that PSP uses for seccomp and AppArmor defaults.
const PSP_ANNOTATION_MARKERS: [&str; 2] = ["seccomp.security", "apparmor.security"];

const UNSET: &str = "<unset>";

/// Compare a running pod with the template declared by its controller.
///
/// Returns the differences of the three checks in order: container security
/// contexts, pod security context, PSP annotations.
pub fn diff_pod_against_template(template: &PodTemplateSpec, pod: &Pod) -> Vec<String> {
    let empty = PodSpec::default();
    let template_spec = template.spec.as_ref().unwrap_or(&empty);
    let pod_spec = pod.spec.as_ref().unwrap_or(&empty);

    let mut differences = diff_container_contexts(template_spec, pod_spec);
    differences.extend(diff_pod_context(
        template_spec.security_context.as_ref(),
        pod_spec.security_context.as_ref(),
    ));

    let no_annotations = BTreeMap::new();
    let template_annotations = template
        .metadata
        .as_ref()
        .and_then(|m| m.annotations.as_ref())
        .unwrap_or(&no_annotations);
    let pod_annotations = pod.metadata.annotations.as_ref().unwrap_or(&no_annotations);
    differences.extend(diff_psp_annotations(template_annotations, pod_annotations));

    differences
}

/// Compare container security contexts position by position.
///
/// Regular containers and init containers are always compared. Ephemeral
/// containers are compared only when the template declares some, since
/// controllers never do and `kubectl debug` adds them to running pods.
pub fn diff_container_contexts(template: &PodSpec, pod: &PodSpec) -> Vec<String> {
    let mut out = Vec::new();

    compare_container_lists(
        "containers",
        &contexts(template.containers.iter().map(|c| c.security_context.as_ref())),
        &contexts(pod.containers.iter().map(|c| c.security_context.as_ref())),
        &mut out,
    );

    let template_init = template.init_containers.as_deref().unwrap_or_default();
    let pod_init = pod.init_containers.as_deref().unwrap_or_default();
    compare_container_lists(
        "initContainers",
        &contexts(template_init.iter().map(|c| c.security_context.as_ref())),
        &contexts(pod_init.iter().map(|c| c.security_context.as_ref())),
        &mut out,
    );

    let template_ephemeral = template.ephemeral_containers.as_deref().unwrap_or_default();
    if !template_ephemeral.is_empty() {
        let pod_ephemeral = pod.ephemeral_containers.as_deref().unwrap_or_default();
        compare_container_lists(
            "ephemeralContainers",
            &contexts(template_ephemeral.iter().map(|c| c.security_context.as_ref())),
            &contexts(pod_ephemeral.iter().map(|c| c.security_context.as_ref())),
            &mut out,
        );
    }

    out
}

/// Compare the pod-level security context.
pub fn diff_pod_context(
    template: Option<&PodSecurityContext>,
    pod: Option<&PodSecurityContext>,
) -> Vec<String> {
    let empty = PodSecurityContext::default();
    let t = template.unwrap_or(&empty);
    let p = pod.unwrap_or(&empty);
    let path = "securityContext";
    let mut out = Vec::new();

    compare_se_linux(
        path,
        t.se_linux_options.as_ref(),
        p.se_linux_options.as_ref(),
        &mut out,
    );
    compare_strict(&format!("{path}.runAsUser"), t.run_as_user, p.run_as_user, &mut out);
    compare_strict(&format!("{path}.runAsGroup"), t.run_as_group, p.run_as_group, &mut out);
    compare_flag(
        &format!("{path}.runAsNonRoot"),
        t.run_as_non_root,
        p.run_as_non_root,
        &mut out,
    );
    compare_strict(&format!("{path}.fsGroup"), t.fs_group, p.fs_group, &mut out);
    compare_list(
        &format!("{path}.supplementalGroups"),
        t.supplemental_groups.as_deref().unwrap_or_default(),
        p.supplemental_groups.as_deref().unwrap_or_default(),
        &mut out,
    );

    out
}

/// Keep only annotations PSP uses to inject seccomp or AppArmor profiles.
pub fn psp_annotations(annotations: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    annotations
        .iter()
        .filter(|(key, _)| PSP_ANNOTATION_MARKERS.iter().any(|m| key.contains(m)))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

/// Compare the PSP-relevant annotations of both sides.
pub fn diff_psp_annotations(
    template: &BTreeMap<String, String>,
    pod: &BTreeMap<String, String>,
) -> Vec<String> {
    let template = psp_annotations(template);
    let pod = psp_annotations(pod);
    let keys: BTreeSet<&str> = template.keys().chain(pod.keys()).copied().collect();

    keys.into_iter()
        .filter_map(|key| {
            let (t, p) = (template.get(key), pod.get(key));
            (t != p).then(|| {
                format!(
                    "annotations[{}]: {} != {}",
                    key,
                    t.copied().unwrap_or(UNSET),
                    p.copied().unwrap_or(UNSET)
                )
            })
        })
        .collect()
}

fn contexts<'a>(
    iter: impl Iterator<Item = Option<&'a SecurityContext>>,
) -> Vec<Option<&'a SecurityContext>> {
    iter.collect()
}

fn compare_container_lists(
    kind: &str,
    template: &[Option<&SecurityContext>],
    pod: &[Option<&SecurityContext>],
    out: &mut Vec<String>,
) {
    for i in 0..template.len().max(pod.len()) {
        let path = format!("{kind}[{i}]");
        match (template.get(i), pod.get(i)) {
            (Some(t), Some(p)) => compare_container_context(&path, *t, *p, out),
            (Some(_), None) => out.push(format!("{path}: declared in template, missing from pod")),
            (None, Some(_)) => out.push(format!("{path}: missing from template, present in pod")),
            (None, None) => {}
        }
    }
}

fn compare_container_context(
    container: &str,
    template: Option<&SecurityContext>,
    pod: Option<&SecurityContext>,
    out: &mut Vec<String>,
) {
    let empty = SecurityContext::default();
    let t = template.unwrap_or(&empty);
    let p = pod.unwrap_or(&empty);
    let path = format!("{container}.securityContext");

    compare_capabilities(&path, t.capabilities.as_ref(), p.capabilities.as_ref(), out);
    compare_se_linux(&path, t.se_linux_options.as_ref(), p.se_linux_options.as_ref(), out);
    compare_strict(&format!("{path}.runAsUser"), t.run_as_user, p.run_as_user, out);
    compare_strict(&format!("{path}.runAsGroup"), t.run_as_group, p.run_as_group, out);
    compare_flag(&format!("{path}.runAsNonRoot"), t.run_as_non_root, p.run_as_non_root, out);
    compare_strict(
        &format!("{path}.allowPrivilegeEscalation"),
        t.allow_privilege_escalation,
        p.allow_privilege_escalation,
        out,
    );
    compare_flag(
        &format!("{path}.readOnlyRootFilesystem"),
        t.read_only_root_filesystem,
        p.read_only_root_filesystem,
        out,
    );
}

fn compare_capabilities(
    path: &str,
    template: Option<&Capabilities>,
    pod: Option<&Capabilities>,
    out: &mut Vec<String>,
) {
    let add = |c: Option<&Capabilities>| c.and_then(|c| c.add.clone()).unwrap_or_default();
    let drop = |c: Option<&Capabilities>| c.and_then(|c| c.drop.clone()).unwrap_or_default();

    compare_list(&format!("{path}.capabilities.add"), &add(template), &add(pod), out);
    compare_list(&format!("{path}.capabilities.drop"), &drop(template), &drop(pod), out);
}

fn compare_se_linux(
    path: &str,
    template: Option<&SELinuxOptions>,
    pod: Option<&SELinuxOptions>,
    out: &mut Vec<String>,
) {
    for ((name, t), (_, p)) in se_linux_fields(template)
        .into_iter()
        .zip(se_linux_fields(pod))
    {
        if t != p {
            out.push(format!(
                "{path}.seLinuxOptions.{name}: {} != {}",
                show_str(t),
                show_str(p)
            ));
        }
    }
}

/// Named `seLinuxOptions` fields, with absent values as `""`.
fn se_linux_fields(options: Option<&SELinuxOptions>) -> [(&'static str, &str); 4] {
    [
        ("user", opt_str(options.and_then(|o| o.user.as_ref()))),
        ("role", opt_str(options.and_then(|o| o.role.as_ref()))),
        ("type", opt_str(options.and_then(|o| o.type_.as_ref()))),
        ("level", opt_str(options.and_then(|o| o.level.as_ref()))),
    ]
}

fn opt_str(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

/// Absent is distinct from every explicit value.
fn compare_strict<T: PartialEq + Display>(
    path: &str,
    template: Option<T>,
    pod: Option<T>,
    out: &mut Vec<String>,
) {
    if template != pod {
        out.push(format!("{path}: {} != {}", show(template), show(pod)));
    }
}

/// Absent equals `false`.
fn compare_flag(path: &str, template: Option<bool>, pod: Option<bool>, out: &mut Vec<String>) {
    if template.unwrap_or(false) != pod.unwrap_or(false) {
        out.push(format!("{path}: {} != {}", show(template), show(pod)));
    }
}

/// Order-sensitive; absent equals `[]`.
fn compare_list<T: PartialEq + Display>(
    path: &str,
    template: &[T],
    pod: &[T],
    out: &mut Vec<String>,
) {
    if template != pod {
        out.push(format!("{path}: {} != {}", show_list(template), show_list(pod)));
    }
}

fn show<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| UNSET.to_string(), |v| v.to_string())
}

fn show_str(value: &str) -> &str {
    if value.is_empty() { UNSET } else { value }
}

fn show_list<T: Display>(values: &[T]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}
