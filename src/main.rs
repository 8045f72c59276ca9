use std::{env, fs, path::Path};

use anyhow::{bail, Context};
use log::info;

use shnode::prelude::*;

fn names(technique: &TechniqueDef<Finalized>, ids: &[VarId]) -> String {
    ids.iter()
        .map(|&id| {
            let var = &technique.variables[id];
            match &var.condition {
                Some(condition) => format!("{} {} [{condition}]", var.r#type, var.name),
                None => format!("{} {}", var.r#type, var.name),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_technique(technique: &TechniqueDef<Finalized>) {
    println!("Technique {}", technique.name.as_deref().unwrap_or("Default"));

    if !technique.uses_nodes() {
        for (stage, source) in technique.shader_sources.iter() {
            println!("  {stage} shader ({}): {}", source.language, source.path);
        }
        return;
    }

    let info = &technique.info;
    for node in technique.nodes.iter() {
        println!(
            "  {} node {}: {}{}",
            node.stage(),
            node.name,
            node.definition.name,
            node.condition
                .as_deref()
                .map(|condition| format!(" if {condition}"))
                .unwrap_or_default()
        );
    }
    println!("  attributes: {}", names(technique, &info.attributes));
    println!("  vertex uniforms: {}", names(technique, &info.vertex_uniforms));
    println!("  fragment uniforms: {}", names(technique, &info.fragment_uniforms));
    println!("  varyings: {}", names(technique, &info.varyings));
    println!(
        "  vertex global: {}",
        names(technique, info.vertex_global.as_slice())
    );
    println!("  fragment globals: {}", names(technique, &info.fragment_globals));
    if !info.unused_nodes.is_empty() {
        println!(
            "  unused nodes: {}",
            info.unused_nodes.iter().cloned().collect::<Vec<_>>().join(", ")
        );
    }
    for (param, define) in technique.param_defines.iter() {
        println!("  define {} <- {param} ({:?})", define.define, define.var_type);
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        bail!("usage: shnode <material-definition> [asset-root]");
    };
    let root = args.next().unwrap_or_else(|| ".".to_owned());

    let text = fs::read_to_string(&path).with_context(|| format!("reading `{path}`"))?;
    let mut loader = DirectoryAssets::new(Path::new(&root));

    let material = read_material_def(&text, &mut loader, LoadOptions::default())
        .with_context(|| format!("loading `{path}`"))?;

    info!(
        "Loaded `{}`: {} parameter(s), {} technique(s)",
        material.name,
        material.params.len(),
        material.techniques.len()
    );

    println!("MaterialDef {}", material.name);
    for technique in material.techniques.iter() {
        print_technique(technique);
    }

    Ok(())
}
