//! Job struct emission.
//!
//! The struct carries one field per capture, type handle and lookup, the
//! rewritten lambda body as `OriginalLambdaBody`, and an `Execute` method
//! shaped after the job kind: a chunk iterator for `Entities.ForEach`, a
//! plain `IJob` for `Job.WithCode`, and an entity-manager loop when the job
//! runs with structural changes.

use super::{EmitOptions, SourceWriter, has_enableable_types};
use crate::describe::{JobDescription, StructField};
use crate::describe::params::LambdaParameterKind;
use crate::rewrite::ENTITY_MANAGER_FIELD;
use crate::semantic::TypeTable;
use lambdajob_ast::print_stmt;

/// Command buffer local created by the execute method.
pub const COMMAND_BUFFER_LOCAL: &str = "__ecb";

/// Whether the job struct holds an entity manager.
pub fn needs_entity_manager(job: &JobDescription) -> bool {
    job.structural_changes
        || job.params.iter().any(|p| p.needs_entity_manager())
        || job
            .rewritten
            .as_ref()
            .is_some_and(|body| body.uses_entity_manager)
}

/// Every field of the job struct, in declaration order, with the expression
/// the execute method assigns to it.
pub fn fields(job: &JobDescription) -> Vec<StructField> {
    let mut fields: Vec<StructField> = Vec::new();
    let mut push = |field: StructField| {
        if !fields.iter().any(|f| f.name == field.name) {
            fields.push(field);
        }
    };

    for capture in &job.captures {
        push(StructField {
            attributes: capture.attributes.iter().map(|a| a.attribute_text()).collect(),
            ty: capture.type_text(&job.containing_type.name),
            name: capture.field_name.clone(),
            init: Some(if capture.is_this() {
                "this".to_string()
            } else {
                capture.name.clone()
            }),
        });
    }

    for param in &job.params {
        let Some(mut field) = param.type_handle_field() else {
            continue;
        };
        match param.kind {
            LambdaParameterKind::EntityCommandBuffer => {
                field.init = Some(COMMAND_BUFFER_LOCAL.to_string());
            }
            _ if job.structural_changes => continue,
            LambdaParameterKind::EntityInQueryIndex => {
                field.init = Some(format!(
                    "{}.CalculateBaseEntityIndexArray(Allocator.TempJob)",
                    job.query_field_name()
                ));
            }
            _ => {}
        }
        push(field);
    }

    if let Some(body) = &job.rewritten {
        for lookup in body.lookups.iter() {
            push(StructField {
                attributes: if lookup.access().is_read_only() {
                    vec!["ReadOnly"]
                } else {
                    Vec::new()
                },
                ty: lookup.field_type(),
                name: lookup.field_name(),
                init: Some(lookup.init()),
            });
        }
    }

    if needs_entity_manager(job) {
        push(StructField {
            attributes: Vec::new(),
            ty: "EntityManager".to_string(),
            name: ENTITY_MANAGER_FIELD.to_string(),
            init: Some("EntityManager".to_string()),
        });
    }

    fields
}

/// `[BurstCompile(...)]`, or `None` when Burst is off.
pub fn burst_attribute(job: &JobDescription) -> Option<String> {
    if !job.burst.enabled {
        return None;
    }
    let mut args = Vec::new();
    if let Some(mode) = &job.burst.float_mode {
        args.push(format!("FloatMode = FloatMode.{}", mode));
    }
    if let Some(precision) = &job.burst.float_precision {
        args.push(format!("FloatPrecision = FloatPrecision.{}", precision));
    }
    if job.burst.synchronous {
        args.push("CompileSynchronously = true".to_string());
    }
    Some(if args.is_empty() {
        "[BurstCompile]".to_string()
    } else {
        format!("[BurstCompile({})]", args.join(", "))
    })
}

pub fn write_job_struct(
    w: &mut SourceWriter,
    job: &JobDescription,
    types: &TypeTable,
    options: &EmitOptions,
) {
    w.line("[Unity.Entities.DOTSCompilerGenerated]");
    if let Some(burst) = burst_attribute(job) {
        w.line(burst);
    }
    let interface = if job.structural_changes {
        ""
    } else if job.is_for_each() {
        " : IJobChunk"
    } else {
        " : IJob"
    };
    w.open(format!("unsafe struct {}{}", job.struct_name(), interface));

    for field in fields(job) {
        for attribute in &field.attributes {
            w.line(format!("[{}]", attribute));
        }
        w.line(format!("public {} {};", field.ty, field.name));
    }
    w.blank();

    write_original_body(w, job);
    w.blank();

    if job.structural_changes {
        write_structural_loop(w, job);
    } else if job.is_for_each() {
        write_chunk_execute(w, job, has_enableable_types(job, types), options);
    } else {
        w.open("public void Execute()");
        w.line("OriginalLambdaBody();");
        w.close();
    }

    w.close();
}

fn write_original_body(w: &mut SourceWriter, job: &JobDescription) {
    let params = job
        .params
        .iter()
        .map(|p| p.method_param())
        .collect::<Vec<_>>()
        .join(", ");
    w.line("[MethodImpl(MethodImplOptions.AggressiveInlining)]");
    w.open(format!("void OriginalLambdaBody({})", params));

    let (body, lines, file) = match &job.rewritten {
        Some(rewritten) => (&rewritten.body, rewritten.lines.as_slice(), rewritten.file.as_str()),
        None => (&job.body, &[][..], ""),
    };
    for (index, stmt) in body.stmts.iter().enumerate() {
        if let Some(line) = lines.get(index) {
            w.directive(format!("#line {} \"{}\"", line, file));
        }
        w.raw(&print_stmt(stmt, w.level()));
    }
    if !lines.is_empty() {
        w.directive("#line default");
        w.directive("#line hidden");
    }
    w.close();
}

fn invocation(job: &JobDescription) -> String {
    let args = job
        .params
        .iter()
        .map(|p| p.invocation_arg())
        .collect::<Vec<_>>()
        .join(", ");
    format!("OriginalLambdaBody({});", args)
}

fn write_entity_visit(w: &mut SourceWriter, job: &JobDescription) {
    for param in &job.params {
        if let Some(read) = param.entity_read() {
            w.line(read);
        }
    }
    w.line(invocation(job));
}

fn write_chunk_execute(
    w: &mut SourceWriter,
    job: &JobDescription,
    enableable: bool,
    options: &EmitOptions,
) {
    w.open("public void Execute(in ArchetypeChunk chunk, int chunkIndex, bool useEnabledMask, in v128 chunkEnabledMask)");
    for param in &job.params {
        if let Some(read) = param.chunk_read() {
            w.line(read);
        }
    }
    w.line("int chunkEntityCount = chunk.Count;");

    if enableable {
        w.open("if (!useEnabledMask)");
    }
    w.open("for (var entityIndex = 0; entityIndex < chunkEntityCount; ++entityIndex)");
    write_entity_visit(w, job);
    w.close();

    if enableable {
        w.close();
        w.open("else");
        w.line("var edgeCount = math.countbits(chunkEnabledMask.ULong0 ^ (chunkEnabledMask.ULong0 << 1)) + math.countbits(chunkEnabledMask.ULong1 ^ (chunkEnabledMask.ULong1 << 1)) - 1;");
        w.open(format!(
            "if (edgeCount <= {})",
            options.enabled_mask_edge_threshold
        ));
        w.line("var entityIndex = 0;");
        w.line("var chunkEndIndex = 0;");
        w.open("while (EnabledBitUtility.TryGetNextRange(chunkEnabledMask, chunkEndIndex, out entityIndex, out chunkEndIndex))");
        w.open("while (entityIndex < chunkEndIndex)");
        write_entity_visit(w, job);
        w.line("entityIndex++;");
        w.close();
        w.close();
        w.close();
        w.open("else");
        w.line("ulong mask64 = chunkEnabledMask.ULong0;");
        w.line("int count = math.min(64, chunkEntityCount);");
        write_mask_scan(w, job, "0", "count");
        w.line("mask64 = chunkEnabledMask.ULong1;");
        write_mask_scan(w, job, "64", "chunkEntityCount");
        w.close();
        w.close();
    }
    w.close();
}

fn write_mask_scan(w: &mut SourceWriter, job: &JobDescription, start: &str, end: &str) {
    w.open(format!(
        "for (var entityIndex = {}; entityIndex < {}; ++entityIndex)",
        start, end
    ));
    w.open("if ((mask64 & 1) != 0)");
    write_entity_visit(w, job);
    w.close();
    w.line("mask64 >>= 1;");
    w.close();
}

fn write_structural_loop(w: &mut SourceWriter, job: &JobDescription) {
    w.open("public void RunWithStructuralChange(EntityQuery query)");
    w.line("var __entities = query.ToEntityArray(Allocator.Temp);");
    w.open("for (int __entityIndex = 0; __entityIndex != __entities.Length; __entityIndex++)");
    w.line("var __entity = __entities[__entityIndex];");
    w.open(format!("if (!{}.Exists(__entity))", ENTITY_MANAGER_FIELD));
    w.line("continue;");
    w.close();
    for param in &job.params {
        if let Some(read) = param.structural_read() {
            w.line(read);
        }
    }
    let args = job
        .params
        .iter()
        .map(|p| p.structural_arg())
        .collect::<Vec<_>>()
        .join(", ");
    w.line(format!("OriginalLambdaBody({});", args));
    for param in &job.params {
        if let Some(write) = param.structural_write() {
            w.line(write);
        }
    }
    w.close();
    w.line("__entities.Dispose();");
    w.close();
}
