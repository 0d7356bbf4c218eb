use clap::{Parser as ClapParser, ValueEnum};
use log::info;
use std::{process, thread};

use mirage::{
    Context, Method, ParentLink, RuntimeResult, Symbol, VM, VMCreateInfo, Value,
};

/// mirrors that override an operation recurse on the host stack
const SCENARIO_STACK_SIZE: usize = 8 * 1024 * 1024;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Scenario {
    Extension,
    Mirror,
    Stress,
    All,
}

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Nesting depth of the delegation stress scenario
    #[arg(long, default_value_t = 1000)]
    depth: usize,

    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Log every mirror forwarding
    #[arg(long, help = "Trace mirror forwarding and mirror root escapes")]
    trace: bool,
}

fn sym(name: &str) -> Symbol {
    Symbol::intern(name)
}

fn code<F>(vm: &VM, body: F) -> RuntimeResult<Value>
where
    F: Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value> + 'static,
{
    vm.native_closure("code", &[], body)
}

/// `def name := value` in the scope being built
fn define(
    name: &'static str,
    value: i64,
) -> impl Fn(&mut VM, &Context, &[Value]) -> RuntimeResult<Value> {
    move |vm, ctx, _| {
        vm.define_field(&Value::Object(ctx.lexical_scope), sym(name), Value::Fixnum(value))?;
        Ok(Value::Nil)
    }
}

fn extension(vm: &mut VM) -> RuntimeResult<()> {
    let a_code = code(vm, define("x", 1))?;
    let a = vm.object_literal(&a_code)?;
    let b_code = code(vm, define("y", 2))?;
    let b = vm.extend(&a, &b_code)?;

    // select answers an accessor closure
    let accessor = vm.select(&b, sym("x"))?;
    let x = vm.apply_value(&accessor, &[])?;
    println!("B.select(B, x) applied => {x}");

    let copy = vm.clone_value(&b)?;
    vm.assign_field(&copy, sym("x"), Value::Fixnum(9))?;
    let copied_x = vm.invoke(&copy, sym("x"), &[])?;
    let original_x = vm.invoke(&a, sym("x"), &[])?;
    println!("B.clone().x := 9 => clone.x = {copied_x}, A.x = {original_x}");

    let shared = vm.share(&a, &b_code)?;
    let shared_copy = vm.clone_value(&shared)?;
    vm.assign_field(&shared_copy, sym("x"), Value::Fixnum(5))?;
    let a_x = vm.invoke(&a, sym("x"), &[])?;
    println!("shares-a clone writes through: A.x = {a_x}");
    vm.assign_field(&a, sym("x"), Value::Fixnum(1))?;
    Ok(())
}

/// A mirror overriding `select` only. It counts selections in a field of
/// its own and defers to the default behavior.
fn counting_mirror(vm: &mut VM) -> RuntimeResult<Value> {
    let root = vm.default_mirror();
    let body = code(vm, |vm, ctx, _| {
        let scope = Value::Object(ctx.lexical_scope);
        vm.define_field(&scope, sym("selections"), Value::Fixnum(0))?;
        let select = Method::native("select", &["receiver", "selector"], |vm, ctx, args| {
            let count = vm.invoke(&ctx.receiver, sym("selections"), &[])?;
            let count = count.as_fixnum().unwrap_or_default() + 1;
            vm.assign_field(&ctx.receiver, sym("selections"), Value::Fixnum(count))?;
            vm.super_send(ctx, sym("select"), args)
        })?;
        vm.add_method(&scope, Value::Method(select))?;
        Ok(Value::Nil)
    })?;
    vm.extend(&root, &body)
}

fn mirror(vm: &mut VM) -> RuntimeResult<()> {
    let prototype = counting_mirror(vm)?;
    let body = code(vm, define("x", 7))?;
    let mirage = vm.create_mirage(&body, &prototype)?;
    let mirror = Value::Object(vm.mirror_of(mirage.expect_object("mirage")?)?);

    let accessor = vm.select(&mirage, sym("x"))?;
    let selected = vm.apply_value(&accessor, &[])?;
    let invoked = vm.invoke(&mirage, sym("x"), &[])?;
    let count = vm.invoke(&mirror, sym("selections"), &[])?;
    println!("mirage.x selected => {selected}, invoked => {invoked}, selections seen: {count}");
    println!("printed as {}", vm.print(&mirage)?);
    Ok(())
}

/// Alternates plain extensions and mirages above a root object holding `x`
/// and reads `x` back from the bottom of the chain.
fn stress(vm: &mut VM, depth: usize) -> RuntimeResult<()> {
    let prototype = counting_mirror(vm)?;
    let root_code = code(vm, define("x", 42))?;
    let mut current = vm.object_literal(&root_code)?;
    let empty = code(vm, |_, _, _| Ok(Value::Nil))?;
    let lexical = vm.top_level_context().lexical_scope;

    for level in 0..depth {
        current = if level % 2 == 0 {
            let id = vm.new_mirage(current, ParentLink::IsA, Some(lexical), &[]);
            let mirage = Value::Object(id);
            vm.new_instance(&prototype, std::slice::from_ref(&mirage))?;
            mirage
        } else {
            vm.extend(&current, &empty)?
        };
    }

    let x = vm.invoke(&current, sym("x"), &[])?;
    info!("delegated through {depth} levels");
    println!("depth {depth}: x => {x}");
    let stats = vm.collect_garbage(&[current]);
    println!("heap: {} live, {} freed", stats.live, stats.freed);
    Ok(())
}

fn run(cli: &Cli) -> RuntimeResult<()> {
    let mut vm = VM::new(VMCreateInfo {
        trace_forwarding: cli.trace,
        ..VMCreateInfo::default()
    });
    let all = cli.scenario == Scenario::All;
    if all || cli.scenario == Scenario::Extension {
        extension(&mut vm)?;
    }
    if all || cli.scenario == Scenario::Mirror {
        mirror(&mut vm)?;
    }
    if all || cli.scenario == Scenario::Stress {
        stress(&mut vm, cli.depth)?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.trace { "trace" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let worker = thread::Builder::new()
        .name("mirage".into())
        .stack_size(SCENARIO_STACK_SIZE)
        .spawn(move || run(&cli));
    let result = match worker.map(|handle| handle.join()) {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            eprintln!("Error: scenario thread panicked");
            process::exit(2);
        }
        Err(err) => {
            eprintln!("Error spawning scenario thread: {err}");
            process::exit(2);
        }
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
