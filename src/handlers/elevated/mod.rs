// Elevated handlers: master role only, across all practices

pub mod practices;
