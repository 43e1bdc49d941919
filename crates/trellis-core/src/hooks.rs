use crate::runtime::Cx;
use crate::state::StateHandle;

/// Run every computation hook declared on `state`'s definition, caching
/// each result in the instance's hook slot.
///
/// Hosts (and the `use_local_state`/`use_provided_state` accessors) call
/// this synchronously before the component body can observe the instance,
/// once per render pass, unconditionally. Hook bodies receive the render
/// context and the instance as receiver; they run in declaration order and
/// may not be skipped or reordered based on data. Slots overridden for
/// tests are left alone.
pub fn inject_hooks(cx: &mut Cx<'_>, state: &StateHandle) {
    let def = state.definition().clone();
    for (idx, (_, hook)) in def.hooks().iter().enumerate() {
        if state.hook_is_overridden(idx) {
            continue;
        }
        let result = hook(cx, state);
        state.cache_hook(idx, result);
    }
}
