//! Prelude evaluated in every fresh context before user code is defined.

/// Names a script must never reach, bound to `undefined` and locked.
pub const HIDDEN_GLOBALS: &[&str] = &[
    "process",
    "require",
    "module",
    "exports",
    "global",
    "Deno",
    "Bun",
    "std",
    "os",
    "__filename",
    "__dirname",
];

pub fn prelude() -> String {
    let hidden = HIDDEN_GLOBALS
        .iter()
        .map(|name| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"(function () {{
  var root = globalThis;
  var lock = function (target, name, value) {{
    Object.defineProperty(target, name, {{
      value: value,
      writable: false,
      enumerable: false,
      configurable: false
    }});
  }};
  var deny = function (name) {{
    return function () {{
      var err = new Error(name + " is not allowed");
      err.name = "SecurityError";
      throw err;
    }};
  }};
  var hidden = [{hidden}];
  for (var i = 0; i < hidden.length; i++) {{
    lock(root, hidden[i], undefined);
  }}
  var blockedFunction = deny("Function");
  var prototypes = [
    Function.prototype,
    Object.getPrototypeOf(function* () {{}}),
    Object.getPrototypeOf(async function () {{}}),
    Object.getPrototypeOf(async function* () {{}})
  ];
  for (var j = 0; j < prototypes.length; j++) {{
    lock(prototypes[j], "constructor", blockedFunction);
  }}
  lock(root, "Function", blockedFunction);
  lock(root, "eval", deny("eval"));
  lock(root, "globalThis", undefined);
}})();"#
    )
}
