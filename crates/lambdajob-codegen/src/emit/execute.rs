//! Execute-method emission.
//!
//! The call site of a lambda job is replaced by a call to
//! `{Name}_Execute`, a member of the containing type that creates the job
//! struct, schedules or runs it, and handles command-buffer playback,
//! shared-component filters and write-back of written captures.

use super::job_struct::{COMMAND_BUFFER_LOCAL, fields};
use super::{SourceWriter, change_filter};
use crate::describe::{JobDescription, Playback, ScheduleMode};
use lambdajob_ast::print_expr;

const INPUT_DEPENDENCY: &str = "__inputDependency";
const JOB_HANDLE: &str = "__jobHandle";
const COMMAND_BUFFER_SYSTEM: &str = "__ecbSystem";

fn passes_by_ref(job: &JobDescription, written: bool) -> bool {
    written && job.schedule.mode == ScheduleMode::Run
}

fn shared_filter_param(index: usize) -> String {
    format!("__sharedFilter{}", index)
}

/// Parameters of the execute method, in call order.
pub fn execute_params(job: &JobDescription) -> Vec<String> {
    let mut params: Vec<String> = job
        .captures
        .iter()
        .filter(|c| !c.is_this())
        .map(|c| {
            let by_ref = if passes_by_ref(job, c.written_inside) { "ref " } else { "" };
            format!("{}{} {}", by_ref, c.type_text(&job.containing_type.name), c.name)
        })
        .collect();
    for index in 0..job.shared_component_filters.len() {
        params.push(format!("TFilter{} {}", index, shared_filter_param(index)));
    }
    if job.schedule.dependency.is_some() {
        params.push(format!("JobHandle {}", INPUT_DEPENDENCY));
    }
    params
}

/// Text replacing the whole chain at the call site.
pub fn call_site(job: &JobDescription) -> String {
    let mut args: Vec<String> = job
        .captures
        .iter()
        .filter(|c| !c.is_this())
        .map(|c| {
            if passes_by_ref(job, c.written_inside) {
                format!("ref {}", c.name)
            } else {
                c.name.clone()
            }
        })
        .collect();
    args.extend(job.shared_component_filters.iter().map(print_expr));
    if let Some(dependency) = &job.schedule.dependency {
        args.push(print_expr(dependency));
    }
    format!("{}({})", job.execute_method_name(), args.join(", "))
}

fn signature(job: &JobDescription) -> String {
    let returns = if job.schedule.dependency.is_some() {
        "JobHandle"
    } else {
        "void"
    };
    let filter_count = job.shared_component_filters.len();
    let generics = if filter_count == 0 {
        String::new()
    } else {
        let names = (0..filter_count)
            .map(|i| format!("TFilter{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!("<{}>", names)
    };
    let constraints = (0..filter_count)
        .map(|i| format!(" where TFilter{} : struct, ISharedComponentData", i))
        .collect::<String>();
    format!(
        "{} {}{}({}){}",
        returns,
        job.execute_method_name(),
        generics,
        execute_params(job).join(", "),
        constraints
    )
}

pub fn write_execute_method(w: &mut SourceWriter, job: &JobDescription) {
    let query = job.query_field_name();
    let dependency = if job.schedule.dependency.is_some() {
        INPUT_DEPENDENCY
    } else {
        "Dependency"
    };

    w.open(signature(job));

    for index in 0..job.shared_component_filters.len() {
        w.line(format!(
            "{}.SetSharedComponentFilterManaged({});",
            query,
            shared_filter_param(index)
        ));
    }

    let playback = job.command_buffer_param().and(job.playback());
    match playback {
        Some(Playback::Immediate) => w.line(format!(
            "var {} = new EntityCommandBuffer(Allocator.Temp);",
            COMMAND_BUFFER_LOCAL
        )),
        Some(Playback::Deferred(system)) => {
            w.line(format!(
                "var {} = World.GetExistingSystemManaged<{}>();",
                COMMAND_BUFFER_SYSTEM, system
            ));
            w.line(format!(
                "var {} = {}.CreateCommandBuffer();",
                COMMAND_BUFFER_LOCAL, COMMAND_BUFFER_SYSTEM
            ));
        }
        None => {}
    }

    w.open(format!("var __job = new {}", job.struct_name()));
    let assigned: Vec<_> = fields(job)
        .into_iter()
        .filter_map(|field| Some((field.name, field.init?)))
        .collect();
    let count = assigned.len();
    for (index, (name, init)) in assigned.into_iter().enumerate() {
        let comma = if index + 1 < count { "," } else { "" };
        w.line(format!("{} = {}{}", name, init, comma));
    }
    w.close_with(";");

    let scheduled = match (job.structural_changes, job.schedule.mode) {
        (true, _) => {
            w.line("CompleteDependency();");
            w.line(format!("__job.RunWithStructuralChange({});", query));
            false
        }
        (false, ScheduleMode::Run) => {
            w.line("CompleteDependency();");
            if job.is_for_each() {
                w.line(format!("__job.Run({});", query));
            } else {
                w.line("__job.Run();");
            }
            false
        }
        (false, mode) => {
            let call = if !job.is_for_each() {
                format!("__job.Schedule({})", dependency)
            } else if mode == ScheduleMode::ScheduleParallel {
                match &job.schedule_granularity {
                    Some(granularity) => format!(
                        "__job.ScheduleParallel({}, ScheduleGranularity.{}, {})",
                        query, granularity, dependency
                    ),
                    None => format!("__job.ScheduleParallel({}, {})", query, dependency),
                }
            } else {
                format!("__job.Schedule({}, {})", query, dependency)
            };
            w.line(format!("var {} = {};", JOB_HANDLE, call));
            if job.schedule.dependency.is_none() {
                w.line(format!("Dependency = {};", JOB_HANDLE));
            }
            true
        }
    };

    match playback {
        Some(Playback::Immediate) => {
            w.line(format!("{}.Playback(EntityManager);", COMMAND_BUFFER_LOCAL));
            w.line(format!("{}.Dispose();", COMMAND_BUFFER_LOCAL));
        }
        Some(Playback::Deferred(_)) => {
            let handle = if scheduled { JOB_HANDLE } else { "Dependency" };
            w.line(format!(
                "{}.AddJobHandleForProducer({});",
                COMMAND_BUFFER_SYSTEM, handle
            ));
        }
        None => {}
    }

    if !job.shared_component_filters.is_empty() {
        w.line(format!("{}.ResetFilter();", query));
        if let Some(filter) = change_filter(&job.entity_query()) {
            w.line(format!("{}.SetChangedVersionFilter({});", query, filter));
        }
    }

    if passes_by_ref(job, true) {
        for capture in job.written_captures().filter(|c| !c.is_this()) {
            w.line(format!("{} = __job.{};", capture.name, capture.field_name));
        }
    }

    if scheduled && job.schedule.dependency.is_some() {
        w.line(format!("return {};", JOB_HANDLE));
    }
    w.close();
}
