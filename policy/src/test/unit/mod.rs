mod tensorcore;
