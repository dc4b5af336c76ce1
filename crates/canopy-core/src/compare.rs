use crate::{arena::Handle, document::Workspace, entity::Entity};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

//
// Structural comparison across workspaces. Identity, annotations, index
// side-tables, and member ordering never participate; two graphs are equal
// when their kinds, names, attributes, bodies, and role memberships agree.
//

/// Returns `true` if the graphs rooted at `a` and `b` are structurally
/// equal.
#[must_use]
pub fn structurally_equal(a_ws: &Workspace, a: Handle, b_ws: &Workspace, b: Handle) -> bool {
    diff(a_ws, a, b_ws, b).is_none()
}

/// Describe the first structural mismatch between two graphs, or `None`
/// when they are equal. The description names the path from the roots down
/// to the disagreement.
#[must_use]
pub fn diff(a_ws: &Workspace, a: Handle, b_ws: &Workspace, b: Handle) -> Option<String> {
    let mut visited = HashSet::new();

    diff_inner(a_ws, a, b_ws, b, "$", &mut visited)
}

fn diff_inner(
    a_ws: &Workspace,
    a: Handle,
    b_ws: &Workspace,
    b: Handle,
    path: &str,
    visited: &mut HashSet<(Handle, Handle)>,
) -> Option<String> {
    if !visited.insert((a, b)) {
        return None;
    }

    let (Some(ea), Some(eb)) = (a_ws.entity(a), b_ws.entity(b)) else {
        return Some(format!("{path}: stale handle"));
    };
    let kind_a = a_ws.registry().spec(ea.kind()).name;
    let kind_b = b_ws.registry().spec(eb.kind()).name;

    if kind_a != kind_b {
        return Some(format!("{path}: kind '{kind_a}' != '{kind_b}'"));
    }
    if ea.name != eb.name {
        return Some(format!(
            "{path}: name {:?} != {:?}",
            ea.name, eb.name
        ));
    }
    if let Some(mismatch) = diff_attrs(ea, eb, path) {
        return Some(mismatch);
    }
    if ea.body != eb.body {
        return Some(format!("{path}: body {:?} != {:?}", ea.body, eb.body));
    }

    diff_members(a_ws, ea, b_ws, eb, path, visited)
}

fn diff_attrs(ea: &Entity, eb: &Entity, path: &str) -> Option<String> {
    let names: BTreeSet<&str> = ea
        .attrs()
        .map(|(n, _)| n)
        .chain(eb.attrs().map(|(n, _)| n))
        .collect();

    for name in names {
        let va = ea.attr(name);
        let vb = eb.attr(name);
        if va != vb {
            return Some(format!("{path}.{name}: {va:?} != {vb:?}"));
        }
    }

    None
}

fn diff_members(
    a_ws: &Workspace,
    ea: &Entity,
    b_ws: &Workspace,
    eb: &Entity,
    path: &str,
    visited: &mut HashSet<(Handle, Handle)>,
) -> Option<String> {
    let roles: BTreeSet<&str> = ea
        .roles()
        .map(|r| r.role)
        .chain(eb.roles().map(|r| r.role))
        .collect();

    for role in roles {
        let names_a: BTreeSet<&str> = ea.members(role).map(|(n, _)| n).collect();
        let names_b: BTreeSet<&str> = eb.members(role).map(|(n, _)| n).collect();

        if names_a != names_b {
            let mut mismatch = format!("{path}.{role}: members differ:");
            for name in names_a.difference(&names_b) {
                let _ = write!(mismatch, " -'{name}'");
            }
            for name in names_b.difference(&names_a) {
                let _ = write!(mismatch, " +'{name}'");
            }
            return Some(mismatch);
        }

        for name in names_a {
            let (Ok(ma), Ok(mb)) = (ea.member(role, name), eb.member(role, name)) else {
                continue;
            };
            let child_path = format!("{path}.{role}['{name}']");
            if let Some(mismatch) = diff_inner(a_ws, ma, b_ws, mb, &child_path, visited) {
                return Some(mismatch);
            }
        }
    }

    None
}
