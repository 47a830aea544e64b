use std::env;

pub fn insta_snapshot<F: FnOnce()>(f: F) {
    let mut settings = insta::Settings::clone_current();
    let snapshot_path = env::current_dir().unwrap().join("./test/snapshots");
    settings.set_snapshot_path(snapshot_path);
    settings.bind(f);
}

/// First turn completion for "create a pipeline that reads a file and
/// uppercases it".
pub fn generation_fixture() -> &'static str {
    return r#"
Reply: I split the pipeline into a reader that loads the input file and a transform that uppercases it.

```python
# read_file.py (Version 1)
def read_file(path):
    with open(path) as handle:
        return handle.read()
```

```python
# transform.py (Version 1)
from read_file import read_file


def run(path):
    return read_file(path).upper()
```

Both scripts are ready to run.
"#
    .trim();
}

/// Second turn completion that only bumps `transform.py`.
pub fn generation_update_fixture() -> &'static str {
    return r#"
Reply: Only the transform changes, it now lowercases the text.

```python
# transform.py (Version 2)
from read_file import read_file


def run(path):
    return read_file(path).lower()
```
"#
    .trim();
}

/// Completion that forgot the reply marker and the header comment.
pub fn generation_without_marker_fixture() -> &'static str {
    return r#"
Sure, here is something that should work.

```python
print("hello")
```
"#
    .trim();
}

/// Graph answer wrapped in chatter the model was told not to send.
pub fn graph_fixture() -> &'static str {
    return r##"
Here is the graph you asked for:
{
  "reply": "Reads a file then uppercases it.",
  "nodes": [
    {
      "id": "read_file",
      "type": "custom",
      "position": { "x": 0.0, "y": 0.0 },
      "data": {
        "label": "Read file",
        "role": "input",
        "inputs": [],
        "outputs": ["output-0"],
        "color": "#4f46e5"
      }
    },
    {
      "id": "transform",
      "type": "custom",
      "position": { "x": 250.0, "y": 0.0 },
      "data": {
        "label": "Uppercase",
        "role": "output",
        "inputs": ["input-0"],
        "outputs": []
      }
    }
  ],
  "edges": [
    {
      "id": "read_file-transform",
      "source": "read_file",
      "target": "transform",
      "sourceHandle": "output-0",
      "targetHandle": "input-0",
      "animated": true
    }
  ]
}
Let me know if anything should change.
"##
    .trim();
}

/// Graph answer whose closing braces never arrive.
pub fn malformed_graph_fixture() -> &'static str {
    return r#"
{
  "reply": "Reads a file then uppercases it.",
  "nodes": [
    { "id": "read_file", "type": "custom", "position": { "x": 0.0, "y": 0.0 },
"#
    .trim();
}

pub fn descriptions_fixture() -> &'static str {
    return r#"
{
  "read_file": "<h3>Read file</h3><p>Loads the input file into memory.</p>",
  "transform": "<h3>Uppercase</h3><p>Uppercases the loaded text.</p>"
}
"#
    .trim();
}
