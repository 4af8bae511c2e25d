use PopBal::Examples::popbal_examples::popbal_examples;
use PopBal::Utils::logger::init_logger;
use log::LevelFilter;

pub fn main() {
    init_logger(LevelFilter::Info);
    //
    let task: usize = 1;
    popbal_examples(task);
}
