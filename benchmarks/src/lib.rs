//! Corpus synthétique partagé par les benchmarks.

#![forbid(unsafe_code)]

use std::fmt::Write as _;

/// Source Spool avec `classes` classes et un `main` qui les utilise toutes.
pub fn synthetic_source(classes: usize) -> String {
    let mut s = String::from("namespace bench\n\n");
    for i in 0..classes {
        let _ = write!(
            s,
            "class Node{i} {{
    var value: Int32 = {i}
    const label: String = \"node {i}\"
    func step(by: Int32) -> Int32 {{
        var acc: Int32 = self.value
        loop {{
            if (acc > 100) {{ break }} else {{ acc += by * 2 }}
        }}
        self.value = acc
        return acc
    }}
}}

"
        );
    }
    s.push_str("main {\n");
    for i in 0..classes {
        let _ = writeln!(s, "    var n{i}: Node{i} = new Node{i}()\n    var r{i}: Int32 = n{i}.step({i} + 1)");
    }
    s.push_str("    new Console().println(\"done\")\n}\n");
    s
}
