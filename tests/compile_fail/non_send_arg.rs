use std::rc::Rc;

fn main() {
    let pool = fiber_pool::TaskPool::new();
    let not_send = Rc::new(5);
    pool.run(|_rc: Rc<i32>| {}, not_send);
}
