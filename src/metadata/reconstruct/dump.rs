//! Textual metadata dump for diagnostics.
//!
//! Renders a reconstructed module into a human-readable listing: per type the
//! base class, interfaces and nested types, per field its staticness, type,
//! layout offset and default, per method its accessibility, return type, file
//! offset, entry address, slot and parameters. Diagnostic use only, not a
//! stable machine format.

use std::fmt::Write;

use crate::{
    metadata::{identity::IdentityStore, typesystem::ManagedModule, typesystem::ManagedTypeRef},
    native::AotBinary,
};

/// Renders `module` into the textual dump format.
#[must_use]
pub fn build_metadata_dump(
    store: &IdentityStore,
    module: &ManagedModule,
    binary: &dyn AotBinary,
) -> String {
    let mut out = String::new();

    for (_, ty) in module.types.iter() {
        let _ = writeln!(out, "Type: {}", ty.fullname());

        if let Some(base) = ty.base().and_then(ManagedTypeRef::fullname) {
            let _ = writeln!(out, "\tBase: {}", base);
        }
        for (_, interface) in ty.interfaces.iter() {
            if let Some(name) = interface.fullname() {
                let _ = writeln!(out, "\tImplements: {}", name);
            }
        }
        for (_, nested) in ty.nested_types.iter() {
            if let Some(name) = nested.fullname() {
                let _ = writeln!(out, "\tNested: {}", name);
            }
        }

        let layout = store.field_layout(ty.token);
        if !layout.is_empty() {
            let _ = writeln!(out, "\tFields:");
        }
        for entry in &layout {
            let kind = if entry.is_static { "static" } else { "instance" };
            let type_name = entry
                .field_type
                .fullname()
                .unwrap_or_else(|| "?".to_string());
            let _ = write!(
                out,
                "\t\t{} field {} {} at offset 0x{:X}, has default: {}",
                kind,
                type_name,
                entry.name,
                entry.offset,
                entry.constant.is_some()
            );
            if let Some(constant) = &entry.constant {
                // Lone surrogates are not renderable text.
                if !constant.is_surrogate_char() {
                    let _ = write!(out, ", default value: {}", constant);
                }
            }
            let _ = writeln!(out);
        }

        if ty.methods.count() > 0 {
            let _ = writeln!(out, "\tMethods:");
        }
        for (_, method) in ty.methods.iter() {
            let return_name = method
                .return_type()
                .and_then(ManagedTypeRef::fullname)
                .unwrap_or_else(|| "?".to_string());
            let file_offset = binary
                .try_map_virtual_address(method.native_address)
                .unwrap_or(0);
            let _ = write!(
                out,
                "\t\t{} {} {} at file offset 0x{:08X}, address 0x{:08x}",
                accessibility(method.flags),
                return_name,
                method.name,
                file_offset,
                method.native_address
            );
            match method.slot {
                Some(slot) => {
                    let _ = writeln!(out, ", slot {}", slot);
                }
                None => {
                    let _ = writeln!(out);
                }
            }

            for (_, param) in method.params.iter() {
                let type_name = param
                    .param_type
                    .fullname()
                    .unwrap_or_else(|| "?".to_string());
                let _ = write!(out, "\t\t\tparameter {}: {}", param.name, type_name);
                if let Some(default) = &param.default_value {
                    let _ = write!(out, " = {}", default);
                }
                let _ = writeln!(out);
            }
        }

        let _ = writeln!(out);
    }

    out
}

/// Renders the member-access bits of raw method flags.
fn accessibility(flags: u32) -> &'static str {
    match flags & 0x7 {
        0x1 => "private",
        0x2 => "private protected",
        0x3 => "internal",
        0x4 => "protected",
        0x5 => "protected internal",
        0x6 => "public",
        _ => "compiler-controlled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessibility_mapping() {
        assert_eq!(accessibility(0x6), "public");
        assert_eq!(accessibility(0x1), "private");
        assert_eq!(accessibility(0x3 | 0x10), "internal");
        assert_eq!(accessibility(0x0), "compiler-controlled");
    }
}
