/// Execute an aggregate command in memory: decide, then apply each event.
///
/// No persistence and no publication. Used by domain tests and by callers
/// that need to preview the resulting state; the full pipeline lives in
/// `CommandDispatcher::dispatch()` in the infra crate.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storefront_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
