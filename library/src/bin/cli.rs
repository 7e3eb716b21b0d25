use rxgraph::ExecutionError;
use rxgraph::run;

fn main() -> Result<(), ExecutionError> {
    env_logger::init();
    run(std::env::args().collect())
}
