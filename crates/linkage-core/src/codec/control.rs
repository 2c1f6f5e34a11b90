//! Control-system records: variables, inputs and transfer elements.
//!
//! Control variables are numbered from 1 in block order: inputs first,
//! then transfer elements. Each block takes one number per internal
//! state and then one for its output, which every line leaving the block
//! carries. Output blocks are read through sensors and get no record.

use std::collections::{BTreeMap, BTreeSet};

use super::format::e14;
use super::writer::SolverWriter;
use crate::control::{ControlElement, ControlKind};
use crate::entity::EntityType;
use crate::id::EntityKey;
use crate::model::Model;

struct Block<'a> {
    key: EntityKey,
    element: &'a ControlElement,
    states: Vec<usize>,
    /// Lines leaving the block, by user id.
    lines: Vec<EntityKey>,
}

struct Numbering<'a> {
    blocks: Vec<Block<'a>>,
    var_of_line: BTreeMap<EntityKey, usize>,
    n_inputs: usize,
    n_vars: usize,
}

fn number_blocks(model: &Model) -> Numbering<'_> {
    let mut elements: Vec<(EntityKey, &ControlElement)> = Vec::new();
    let mut inputs: Vec<(EntityKey, &ControlElement)> = Vec::new();
    for key in model.keys_of_type(EntityType::ControlElement) {
        let Some(e) = model.control_element(key) else {
            continue;
        };
        match e.kind {
            ControlKind::Input => inputs.push((key, e)),
            ControlKind::Output => {}
            _ => elements.push((key, e)),
        }
    }
    let n_inputs = inputs.len();

    let all_lines: Vec<EntityKey> = model.keys_of_type(EntityType::ControlLine);
    let lines_from = |block: EntityKey| -> Vec<EntityKey> {
        all_lines
            .iter()
            .copied()
            .filter(|l| model.control_line(*l).is_some_and(|cl| cl.start == Some(block)))
            .collect()
    };

    let mut var_of_line: BTreeMap<EntityKey, usize> = BTreeMap::new();
    let mut blocks = Vec::with_capacity(inputs.len() + elements.len());
    let mut runner = 1;
    for (key, element) in inputs.into_iter().chain(elements) {
        let states: Vec<usize> = (0..element.kind.state_count()).map(|i| runner + i).collect();
        runner += states.len();
        let lines = lines_from(key);
        for line in &lines {
            var_of_line.insert(*line, runner);
        }
        runner += 1;
        blocks.push(Block {
            key,
            element,
            states,
            lines,
        });
    }

    Numbering {
        blocks,
        var_of_line,
        n_inputs,
        n_vars: runner - 1,
    }
}

/// Control variable feeding an output block, as read by `CONTROL` sensors.
pub(super) fn output_variable(model: &Model, output: EntityKey) -> Option<usize> {
    let numbering = number_blocks(model);
    model
        .keys_of_type(EntityType::ControlLine)
        .into_iter()
        .find(|l| model.control_line(*l).is_some_and(|cl| cl.end == Some(output)))
        .and_then(|l| numbering.var_of_line.get(&l).copied())
}

pub(super) fn write_control_system(w: &mut SolverWriter<'_>) {
    let Numbering {
        blocks,
        var_of_line,
        n_inputs,
        n_vars,
    } = number_blocks(w.model);
    if n_vars < 1 {
        return;
    }

    w.put("! Control lines (non-internal control variables)\n");
    let mut external = BTreeSet::new();
    for (i, block) in blocks.iter().enumerate() {
        for (j, line) in block.lines.iter().enumerate() {
            let var = var_of_line.get(line).copied().unwrap_or(0);
            if j == 0 {
                external.insert(var);
                w.begin("CONTROL_VARIABLE");
            } else {
                w.begin("CONTROL_LINE");
            }
            w.print_id(*line);
            put!(w, "  iVar = {var}\n");
            if j == 0 && i < n_inputs {
                w.put("  status = 1\n");
            }
            w.put("/\n\n");
        }
    }

    if external.len() < n_vars {
        // Internal variables have no entity; they get fresh base ids and
        // no user id so that restart files stay consistent.
        w.put("! Internal control variables\n");
        for var in (1..=n_vars).filter(|v| !external.contains(v)) {
            w.begin("CONTROL_VARIABLE");
            put!(w, "  id = {}\n  iVar = {var}\n/\n\n", w.next_base_id);
            w.next_base_id += 1;
        }
    }

    for block in &blocks {
        let output = block.lines.first().and_then(|l| var_of_line.get(l)).copied();
        if block.element.kind == ControlKind::Input {
            write_input(w, block, output);
        } else {
            write_element(w, block, output, &var_of_line);
        }
    }
}

fn write_input(w: &mut SolverWriter<'_>, block: &Block<'_>, output: Option<usize>) {
    w.begin("CONTROL_INPUT");
    w.print_id(block.key);
    if let Some(var) = output {
        put!(w, "  iVar = {var}\n");
    }
    if let Some(engine) = block.element.engine {
        put!(w, "  inEngineID = {}\n", w.model.base_id(engine).0);
    }
    w.put("/\n\n");
}

fn write_element(
    w: &mut SolverWriter<'_>,
    block: &Block<'_>,
    output: Option<usize>,
    var_of_line: &BTreeMap<EntityKey, usize>,
) {
    let model = w.model;
    let element = block.element;
    let Some((code, label)) = element.kind.solver_type() else {
        return;
    };
    put!(w, "! {label}\n");
    w.begin("CONTROL_ELEMENT");
    w.print_id(block.key);
    put!(w, "  type = {code}\n");

    let real_data = real_data(element);
    if let Some((count, values)) = real_data {
        put!(w, "  nRealData = {count}\n  realData = {values}\n");
    }

    // Input ports in port order.
    let mut ports: Vec<(usize, usize)> = model
        .keys_of_type(EntityType::ControlLine)
        .into_iter()
        .filter_map(|l| {
            let cl = model.control_line(l)?;
            (cl.end == Some(block.key)).then(|| (cl.port, var_of_line.get(&l).copied().unwrap_or(0)))
        })
        .collect();
    ports.sort_by_key(|(port, _)| *port);

    w.put("  variables =");
    for (_, var) in &ports {
        put!(w, " {var}");
    }
    w.put("  ");
    for state in &block.states {
        put!(w, " {state}");
    }
    w.put("  ");
    if let Some(var) = output {
        put!(w, " {var}\n");
    }
    w.put("/\n\n");
}

/// `nRealData` and the formatted `realData` values.
fn real_data(element: &ControlElement) -> Option<(usize, String)> {
    let join = |n: usize| -> String {
        (0..n)
            .map(|i| e14(element.param(i)))
            .collect::<Vec<_>>()
            .join(" ")
    };
    match element.kind {
        ControlKind::Multiplier => None,
        ControlKind::Adder | ControlKind::Comparator => Some((1, e14(1.0))),
        ControlKind::Hysteresis => Some((9, format!("{} 0. 0. 0. 0. 0. 0.", join(3)))),
        ControlKind::SampleHold => Some((6, format!("{} 0. 0. 0. 0. 0.", join(1)))),
        kind => {
            let n = kind.param_count();
            Some((n, join(n)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::emit_to_string;
    use crate::config::EmitOptions;
    use crate::control::ControlLine;
    use crate::function::{Engine, Function};
    use crate::model::Model;

    fn wire(m: &mut Model, start: EntityKey, end: EntityKey, port: usize) -> EntityKey {
        m.insert(ControlLine {
            start: Some(start),
            end: Some(end),
            port,
        })
    }

    /// input -> PI -> output
    fn pi_loop(m: &mut Model) -> (EntityKey, EntityKey, EntityKey) {
        let f = m.insert(Function::constant(1.0));
        let e = m.insert(Engine::with_function(f));
        let mut input = ControlElement::new(ControlKind::Input);
        input.engine = Some(e);
        let input = m.insert(input);
        let pi = m.insert(ControlElement::with_params(ControlKind::Pi, &[2.0, 0.5]));
        let output = m.insert(ControlElement::new(ControlKind::Output));
        wire(m, input, pi, 1);
        wire(m, pi, output, 1);
        (input, pi, output)
    }

    #[test]
    fn pi_loop_numbering() {
        let mut m = Model::default();
        pi_loop(&mut m);
        let text = emit_to_string(&mut m, &EmitOptions::default()).unwrap();
        // Ids: function 1, engine 2, input 3, pi 4, output 5, lines 6 and 7.
        assert!(text.contains(
            "! Control lines (non-internal control variables)\n\
             &CONTROL_VARIABLE\n  id = 6\n  extId = 1\n  iVar = 1\n  status = 1\n/\n\n\
             &CONTROL_VARIABLE\n  id = 7\n  extId = 2\n  iVar = 3\n/\n\n\
             ! Internal control variables\n&CONTROL_VARIABLE\n  id = 8\n  iVar = 2\n/\n\n"
        ));
        assert!(text.contains("&CONTROL_INPUT\n  id = 3\n  extId = 1\n  iVar = 1\n  inEngineID = 2\n/\n\n"));
        assert!(text.contains(
            "! PI\n&CONTROL_ELEMENT\n  id = 4\n  extId = 2\n  type = 31\n  nRealData = 2\n\
             \x20 realData =   2.000000e+00   5.000000e-01\n  variables = 1   2   3\n/\n\n"
        ));
    }

    #[test]
    fn adder_uses_unit_data() {
        let e = ControlElement::new(ControlKind::Adder);
        assert_eq!(real_data(&e), Some((1, "  1.000000e+00".to_string())));
        assert_eq!(real_data(&ControlElement::new(ControlKind::Multiplier)), None);
        let h = ControlElement::with_params(ControlKind::Hysteresis, &[1.0, 2.0, 3.0]);
        let (n, text) = real_data(&h).unwrap();
        assert_eq!(n, 9);
        assert!(text.ends_with("3.000000e+00 0. 0. 0. 0. 0. 0."));
    }

    #[test]
    fn empty_control_system_writes_nothing() {
        let mut m = Model::default();
        let text = emit_to_string(&mut m, &EmitOptions::default()).unwrap();
        assert!(!text.contains("CONTROL"));
    }
}
