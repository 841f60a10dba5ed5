/// Generated source templates
///
/// Two files are produced per build: a PureScript module exposing every
/// handler under its function name (compiler input), and a JavaScript adapter
/// that reorders Lambda's `(event, context, callback)` into the compiled
/// calling convention. Both are plain string builders; the layout is stable so
/// repeated builds produce identical output.

use crate::extract::{FunctionDescriptor, ModuleSet};

/// PureScript module name of the generated entrypoint source.
pub const ENTRYPOINT_MODULE: &str = "ServerlessPurescriptHandlers";

/// File name of the generated entrypoint source.
pub const ENTRYPOINT_FILE: &str = "handlers.purs";

/// Module name the host resolves handlers against.
pub const ADAPTER_MODULE: &str = "purescript";

/// File name of the adapter, relative to the service root.
pub const ADAPTER_FILE: &str = "purescript.js";

const PURESCRIPT_BANNER: &str = "-- AUTOGENERATED FILE.  DO NOT MODIFY";
const JAVASCRIPT_BANNER: &str = "// AUTOGENERATED FILE.  DO NOT MODIFY.";

/// Render the PureScript compiler input.
pub fn render_entrypoints(modules: &ModuleSet, functions: &[FunctionDescriptor]) -> String {
    let mut out = String::new();

    out.push('\n');
    out.push_str(&format!("module {} where\n", ENTRYPOINT_MODULE));
    out.push_str(PURESCRIPT_BANNER);
    out.push_str("\n\n");
    out.push_str("import Prelude\n");
    out.push_str("import AWS.Lambda (Lambda, exposeLambda, runLambda)\n");
    out.push_str("import Main (Effects)\n");

    for module in modules.iter() {
        out.push_str(&format!("\nimport {} as {}\n", module, module));
    }
    out.push_str("\n\n");

    for function in functions {
        out.push('\n');
        out.push_str(PURESCRIPT_BANNER);
        out.push('\n');
        out.push_str(&format!("--{} :: Lambda Effects\n", function.name));
        out.push_str(&format!(
            "{} = exposeLambda $ runLambda {}\n\n",
            function.name, function.qualified_name
        ));
    }
    out.push('\n');

    out
}

/// Render the JavaScript adapter exporting one wrapper per function.
pub fn render_adapter(functions: &[FunctionDescriptor], debug_mode: bool) -> String {
    let mut out = String::new();

    out.push('\n');
    out.push_str(JAVASCRIPT_BANNER);
    out.push_str("\n\n");
    out.push_str(&format!(
        "const handlers = require('./output/{}');\n\n",
        ENTRYPOINT_MODULE
    ));

    for function in functions {
        out.push('\n');
        out.push_str(JAVASCRIPT_BANNER);
        out.push('\n');
        out.push_str(&format!(
            "exports.{} = function(data, context, callback) {{\n  ",
            function.name
        ));
        if debug_mode {
            out.push_str("\n  console.log(\"Incoming Data: \");\n  console.log(data);\n  ");
        }
        // Compiled handlers take (context, callback, payload) and return an effect.
        out.push_str(&format!(
            "\n  handlers.{}(context, callback, data)();\n}}\n\n",
            function.name
        ));
    }
    out.push('\n');

    out
}
