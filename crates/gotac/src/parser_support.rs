use crate::ast::NodeId;
use crate::sema::{Loc, ParamGroup, Sema, VarName};

/// One comma-separated entry of a parameter or result list as written.
///
/// A lone identifier is ambiguous until the whole list is seen: in
/// `(a, b int)` it is a name, in `(a, b)` it is a type.
#[derive(Clone, Debug)]
pub enum ParamEntry {
    Bare(VarName),
    Typed {
        name: Option<VarName>,
        ty: NodeId,
        variadic: bool,
        loc: Loc,
    },
}

impl ParamEntry {
    pub fn loc(&self) -> Loc {
        match self {
            ParamEntry::Bare(v) => v.loc,
            ParamEntry::Typed { loc, .. } => *loc,
        }
    }
}

/// Groups entries into `names type` runs, Go style: either every entry
/// has a name or none does.
pub fn resolve_param_list(sema: &mut Sema, entries: Vec<ParamEntry>) -> Vec<ParamGroup> {
    let named = entries
        .iter()
        .any(|e| matches!(e, ParamEntry::Typed { name: Some(_), .. }));
    let mut out = Vec::new();

    if !named {
        for entry in entries {
            let group = match entry {
                ParamEntry::Bare(v) => ParamGroup {
                    ty: sema.named_type(&v.name, v.loc),
                    names: Vec::new(),
                    variadic: false,
                    loc: v.loc,
                },
                ParamEntry::Typed {
                    ty, variadic, loc, ..
                } => ParamGroup {
                    names: Vec::new(),
                    ty,
                    variadic,
                    loc,
                },
            };
            out.push(group);
        }
        return out;
    }

    let mut pending: Vec<VarName> = Vec::new();
    let mut pending_start: Option<Loc> = None;
    for entry in entries {
        match entry {
            ParamEntry::Bare(v) => {
                pending_start.get_or_insert(v.loc);
                pending.push(v);
            }
            ParamEntry::Typed {
                name: Some(name),
                ty,
                variadic,
                loc,
            } => {
                let mut names = std::mem::take(&mut pending);
                names.push(name);
                let loc = pending_start.take().map_or(loc, |start| start.to(loc));
                out.push(ParamGroup {
                    names,
                    ty,
                    variadic,
                    loc,
                });
            }
            ParamEntry::Typed { name: None, loc, .. } => {
                sema.syntax_error("mixed named and unnamed parameters", loc);
            }
        }
    }
    if let Some(last) = pending.last() {
        sema.syntax_error("mixed named and unnamed parameters", last.loc);
    }
    out
}

/// A variadic parameter must come last.
pub fn check_variadic_position(sema: &mut Sema, groups: &[ParamGroup]) {
    let n = groups.len();
    for (i, g) in groups.iter().enumerate() {
        if g.variadic && (i + 1 != n || g.names.len() > 1) {
            sema.syntax_error("can only use ... with final parameter in list", g.loc);
        }
    }
}
